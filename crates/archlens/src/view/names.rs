//! Display labels for view packages.

use super::View;

/// Assign the label of every package in `view`.
///
/// With `use_path` the label is the package's dotted name. Otherwise it is
/// the last path segment, and packages sharing a last segment with another
/// package of no greater depth get their parent segment prepended.
pub fn apply_labels(view: &mut View, use_path: bool) {
    if use_path {
        for package in view.values_mut() {
            package.label = package.name.clone();
        }
        return;
    }

    let segments: Vec<(String, Vec<String>)> = view
        .values()
        .map(|package| {
            let parts = if package.path.is_empty() {
                vec![package.name.clone()]
            } else {
                package.path.split('/').map(str::to_owned).collect()
            };
            (package.path.clone(), parts)
        })
        .collect();

    for (path, parts) in &segments {
        let Some(leaf) = parts.last() else {
            continue;
        };
        let qualify = segments.iter().any(|(other_path, other_parts)| {
            other_path != path
                && other_parts.last() == Some(leaf)
                && parts.len() >= other_parts.len()
        });

        let label = if qualify {
            parts[parts.len().saturating_sub(2)..].join(".")
        } else {
            leaf.clone()
        };
        if let Some(package) = view.get_mut(path) {
            package.label = label;
        }
    }
}
