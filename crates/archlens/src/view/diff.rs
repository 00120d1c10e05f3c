//! Comparison of two evaluations of the same view.
//!
//! The local view is the one being reviewed (for example a pull request
//! branch), the remote view is its baseline. Packages and dependencies are
//! matched by path, so the two views may come from different checkouts.

use super::{DependencyRender, EdgeChange, EntityState, View, ViewDependency, ViewPackage};

/// A single architectural difference between two views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    PackageCreated {
        path: String,
    },
    PackageDeleted {
        path: String,
    },
    DependencyCreated {
        source: String,
        destination: String,
        count: usize,
    },
    DependencyDeleted {
        source: String,
        destination: String,
        count: usize,
    },
    CountChanged {
        source: String,
        destination: String,
        delta: i64,
    },
}

/// The union of two views with every package and dependency annotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffView {
    packages: View,
}

impl DiffView {
    pub fn packages(&self) -> &View {
        &self.packages
    }

    pub fn packages_mut(&mut self) -> &mut View {
        &mut self.packages
    }

    /// `false` means the two views describe the same architecture.
    pub fn has_changes(&self) -> bool {
        self.packages.values().any(|package| {
            package.state != EntityState::Neutral
                || package
                    .dependencies
                    .iter()
                    .any(|dependency| dependency.render.is_annotated())
        })
    }

    /// Every created or deleted package and every created, deleted or
    /// re-counted dependency, ordered by package path.
    pub fn changes(&self) -> Vec<Change> {
        let mut changes = Vec::new();
        for package in self.packages.values() {
            match package.state {
                EntityState::Created => changes.push(Change::PackageCreated {
                    path: package.path.clone(),
                }),
                EntityState::Deleted => changes.push(Change::PackageDeleted {
                    path: package.path.clone(),
                }),
                EntityState::Neutral => {}
            }
            changes.extend(package.dependencies.iter().filter_map(dependency_change));
        }
        changes
    }
}

fn dependency_change(dependency: &ViewDependency) -> Option<Change> {
    let DependencyRender::DiffAnnotated { change, delta, .. } = &dependency.render else {
        return None;
    };
    let source = dependency.source.clone();
    let destination = dependency.destination.clone();
    Some(match change {
        EdgeChange::Created => Change::DependencyCreated {
            source,
            destination,
            count: dependency.count,
        },
        EdgeChange::Deleted => Change::DependencyDeleted {
            source,
            destination,
            count: dependency.count,
        },
        EdgeChange::CountChanged => Change::CountChanged {
            source,
            destination,
            delta: *delta,
        },
    })
}

/// Annotate `local` against its baseline `remote`.
///
/// Packages only in `local` are created and packages only in `remote` are
/// deleted, together with all of their dependencies. Packages present on both
/// sides are compared dependency by dependency; unchanged dependencies stay
/// in the result without annotation.
pub fn diff(local: &View, remote: &View) -> DiffView {
    let mut packages = View::new();

    for (path, package) in local {
        let annotated = match remote.get(path) {
            Some(baseline) => compare(package, baseline),
            None => mark(package, EntityState::Created),
        };
        packages.insert(path.clone(), annotated);
    }
    for (path, package) in remote {
        if !local.contains_key(path) {
            packages.insert(path.clone(), mark(package, EntityState::Deleted));
        }
    }

    DiffView { packages }
}

fn count_delta(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn created(mut dependency: ViewDependency) -> ViewDependency {
    let delta = count_delta(dependency.count);
    dependency.state = EntityState::Created;
    dependency.render = DependencyRender::DiffAnnotated {
        change: EdgeChange::Created,
        delta,
        label: format!("{} (+{delta})", dependency.count),
    };
    dependency
}

fn deleted(mut dependency: ViewDependency) -> ViewDependency {
    let delta = -count_delta(dependency.count);
    dependency.state = EntityState::Deleted;
    dependency.render = DependencyRender::DiffAnnotated {
        change: EdgeChange::Deleted,
        delta,
        label: format!("0 ({delta})"),
    };
    dependency
}

fn mark(package: &ViewPackage, state: EntityState) -> ViewPackage {
    let mut package = package.clone();
    package.state = state;
    package.dependencies = package
        .dependencies
        .into_iter()
        .map(|dependency| match state {
            EntityState::Deleted => deleted(dependency),
            _ => created(dependency),
        })
        .collect();
    package
}

fn compare(local: &ViewPackage, remote: &ViewPackage) -> ViewPackage {
    let mut package = local.clone();
    package.state = EntityState::Neutral;

    for dependency in &mut package.dependencies {
        match remote.dependency(&dependency.destination) {
            None => *dependency = created(dependency.clone()),
            Some(baseline) if baseline.count != dependency.count => {
                let delta = count_delta(dependency.count) - count_delta(baseline.count);
                dependency.render = DependencyRender::DiffAnnotated {
                    change: EdgeChange::CountChanged,
                    delta,
                    label: format!("{} ({delta:+})", dependency.count),
                };
            }
            Some(_) => {}
        }
    }

    let removed: Vec<ViewDependency> = remote
        .dependencies
        .iter()
        .filter(|baseline| local.dependency(&baseline.destination).is_none())
        .map(|baseline| {
            let mut dependency = deleted(baseline.clone());
            dependency.source = local.path.clone();
            dependency
        })
        .collect();
    package.dependencies.extend(removed);
    package
        .dependencies
        .sort_by(|a, b| a.destination.cmp(&b.destination));
    package
}
