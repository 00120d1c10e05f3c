//! Package selection and rollup.

use indexmap::IndexMap;
use log::{debug, trace};
use rustc_hash::FxHashSet;

use super::{EntityState, FileRelation, View, ViewDependency, ViewPackage, apply_labels};
use crate::{
    config::{PackageSelector, ViewSpec},
    error::ModelError,
    project_model::{FileId, PackageId, ProjectModel, normalize_path},
};

/// Check that every concrete path named by `spec` exists in the model.
///
/// Anchored selectors must name a package; prefix selectors must match at
/// least one. Selectors containing `*` and ignore patterns are not checked.
pub fn validate_view_spec(
    model: &ProjectModel,
    view_name: &str,
    spec: &ViewSpec,
) -> Result<(), ModelError> {
    let unknown = |path: &str| ModelError::UnknownViewPath {
        view: view_name.to_owned(),
        path: path.to_owned(),
    };

    for selector in &spec.packages {
        match selector {
            PackageSelector::Anchored { path, .. } if !path.contains('*') => {
                model.get_package(path).map_err(|_| unknown(path))?;
            }
            PackageSelector::Prefix(prefix) if !prefix.contains('*') => {
                let prefix_path = normalize_path(prefix);
                if !model
                    .packages()
                    .any(|package| package.relative_path.starts_with(&prefix_path))
                {
                    return Err(unknown(prefix));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Evaluate `spec` against the model's current scope.
pub fn filter_view(model: &ProjectModel, spec: &ViewSpec) -> View {
    let included = included_packages(model, spec);
    debug!(
        "View selects {} of {} packages",
        included.len(),
        model.package_count()
    );

    let mut view: View = included
        .iter()
        .map(|&id| {
            let package = rolled_up_package(model, id, &included);
            (package.path.clone(), package)
        })
        .collect();
    apply_labels(&mut view, spec.use_package_path_as_label());
    view
}

fn included_packages(model: &ProjectModel, spec: &ViewSpec) -> FxHashSet<PackageId> {
    let scope = model.scope();
    let candidates = model.subtree(scope);

    let mut selected: FxHashSet<PackageId> = FxHashSet::default();
    if spec.packages.is_empty() {
        selected.insert(scope);
    }
    for selector in &spec.packages {
        match selector {
            PackageSelector::Prefix(prefix) => {
                let prefix = normalize_path(prefix);
                selected.extend(
                    candidates
                        .iter()
                        .copied()
                        .filter(|&id| model.package(id).relative_path.starts_with(&prefix)),
                );
            }
            PackageSelector::Anchored { path, depth } => {
                let anchor_path = normalize_path(&path.replace('*', ""));
                let anchor = if anchor_path.is_empty() {
                    Some(scope)
                } else {
                    model.get_package(&anchor_path).ok()
                };
                match anchor {
                    Some(anchor) if candidates.contains(&anchor) => {
                        selected.extend(expand(model, anchor, *depth));
                    }
                    _ => trace!("Selector `{path}` matches nothing in scope"),
                }
            }
        }
    }

    selected.retain(|&id| !is_ignored(&model.package(id).relative_path, &spec.ignore_packages));
    selected
}

/// `anchor` and its descendants at most `depth` levels below it.
fn expand(model: &ProjectModel, anchor: PackageId, depth: usize) -> Vec<PackageId> {
    let anchor_depth = model.package(anchor).depth;
    model
        .subtree(anchor)
        .into_iter()
        .filter(|&id| model.package(id).depth - anchor_depth <= depth)
        .collect()
}

fn is_ignored(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        match pattern
            .strip_prefix('*')
            .and_then(|rest| rest.strip_suffix('*'))
        {
            Some(text) => path.contains(normalize_path(text).as_str()),
            None => path.starts_with(normalize_path(pattern).as_str()),
        }
    })
}

/// Files whose edges `package` carries in the view: its own files plus those
/// of every excluded descendant, stopping at included descendants.
fn absorbed_files(
    model: &ProjectModel,
    package: PackageId,
    included: &FxHashSet<PackageId>,
) -> Vec<FileId> {
    let mut files = Vec::new();
    let mut stack = vec![package];
    while let Some(id) = stack.pop() {
        let current = model.package(id);
        files.extend(current.files.iter().copied());
        stack.extend(
            current
                .children
                .iter()
                .copied()
                .filter(|child| !included.contains(child)),
        );
    }
    files
}

/// Nearest package in `package`'s chain (itself included) that is part of
/// the view.
fn nearest_included(
    model: &ProjectModel,
    package: PackageId,
    included: &FxHashSet<PackageId>,
) -> Option<PackageId> {
    model
        .package_chain(package)
        .find(|id| included.contains(id))
}

fn rolled_up_package(
    model: &ProjectModel,
    id: PackageId,
    included: &FxHashSet<PackageId>,
) -> ViewPackage {
    let package = model.package(id);
    let mut merged: IndexMap<PackageId, ViewDependency> = IndexMap::new();

    for source in absorbed_files(model, id, included) {
        for target in model.dependencies(source) {
            let target_package = model.file(target).package;
            let Some(destination) = nearest_included(model, target_package, included) else {
                continue;
            };
            if destination == id {
                continue;
            }

            let dependency = merged.entry(destination).or_insert_with(|| {
                ViewDependency::new(
                    package.relative_path.clone(),
                    model.package(destination).relative_path.clone(),
                )
            });
            dependency.count += 1;
            dependency.relations.push(FileRelation {
                from: model.file(source).relative_path.clone(),
                to: model.file(target).relative_path.clone(),
            });
        }
    }

    let mut dependencies: Vec<ViewDependency> = merged.into_values().collect();
    dependencies.sort_by(|a, b| a.destination.cmp(&b.destination));
    for dependency in &mut dependencies {
        dependency.relations.sort();
    }

    let name = if package.relative_path.is_empty() {
        package.name.clone()
    } else {
        package.relative_path.replace('/', ".")
    };
    ViewPackage {
        path: package.relative_path.clone(),
        label: name.clone(),
        name,
        state: EntityState::Neutral,
        dependencies,
        origin: id,
    }
}
