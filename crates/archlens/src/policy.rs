//! Architectural policies and their validation.
//!
//! Policies are declared on a built [`ProjectModel`] and evaluated on demand
//! against the full file-level graph. Scope changes and view filters have no
//! influence on validation.

use std::fmt;

use log::debug;
use serde::Deserialize;

use crate::{
    config::{NodeSelector, PolicyRule},
    error::ModelError,
    project_model::{FileId, NodeRef, ProjectModel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    MustDependOn,
    CannotDependOn,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MustDependOn => f.write_str("must depend on"),
            Self::CannotDependOn => f.write_str("cannot depend on"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub kind: PolicyKind,
    pub subject: NodeRef,
    pub target: NodeRef,
}

/// What made a policy fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violator {
    /// A forbidden file-level edge
    Edge { from: FileId, to: FileId },
    /// No edge from the subject reaches the target
    MissingDependency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyViolation {
    pub policy: Policy,
    pub violator: Violator,
}

impl PolicyViolation {
    /// Human readable description using the model's paths.
    pub fn describe(&self, model: &ProjectModel) -> String {
        let subject = node_name(model, self.policy.subject);
        let target = node_name(model, self.policy.target);
        match self.violator {
            Violator::Edge { from, to } => format!(
                "`{subject}` {} `{target}`, but {} imports {}",
                self.policy.kind,
                model.file(from).relative_path,
                model.file(to).relative_path
            ),
            Violator::MissingDependency => format!(
                "`{subject}` {} `{target}`, but no such import exists",
                self.policy.kind
            ),
        }
    }
}

fn node_name(model: &ProjectModel, node: NodeRef) -> String {
    match node {
        NodeRef::Package(id) => {
            let package = model.package(id);
            if package.relative_path.is_empty() {
                package.name.clone()
            } else {
                package.relative_path.replace('/', ".")
            }
        }
        NodeRef::File(id) => model.file(id).relative_path.clone(),
    }
}

impl ProjectModel {
    /// Require an edge from `subject` to `target`.
    pub fn must_depend_on(&mut self, subject: impl Into<NodeRef>, target: impl Into<NodeRef>) {
        self.declare_policy(PolicyKind::MustDependOn, subject.into(), target.into());
    }

    /// Forbid every edge from `subject` to `target`.
    pub fn cannot_depend_on(&mut self, subject: impl Into<NodeRef>, target: impl Into<NodeRef>) {
        self.declare_policy(PolicyKind::CannotDependOn, subject.into(), target.into());
    }

    fn declare_policy(&mut self, kind: PolicyKind, subject: NodeRef, target: NodeRef) {
        self.policies.push(Policy {
            kind,
            subject,
            target,
        });
    }

    /// Declare every policy of a configuration file.
    pub fn apply_policies(&mut self, rules: &[PolicyRule]) -> Result<(), ModelError> {
        for rule in rules {
            let subject = self.resolve_selector(&rule.from)?;
            let target = self.resolve_selector(&rule.to)?;
            debug!("Declaring policy {:?} {:?} -> {:?}", rule.kind, rule.from, rule.to);
            self.declare_policy(rule.kind, subject, target);
        }
        Ok(())
    }

    fn resolve_selector(&self, selector: &NodeSelector) -> Result<NodeRef, ModelError> {
        match selector {
            NodeSelector::Package(path) => self.get_package(path).map(NodeRef::Package),
            NodeSelector::File(path) => self.get_file(path).map(NodeRef::File),
        }
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Evaluate every policy and stop at the first failure.
    pub fn validate(&self) -> Result<(), PolicyViolation> {
        for policy in &self.policies {
            if let Some(violation) = self.check(policy).into_iter().next() {
                return Err(violation);
            }
        }
        Ok(())
    }

    /// Every failure of every policy, in declaration order.
    pub fn violations(&self) -> Vec<PolicyViolation> {
        self.policies
            .iter()
            .flat_map(|policy| self.check(policy))
            .collect()
    }

    fn check(&self, policy: &Policy) -> Vec<PolicyViolation> {
        let edges = self.edges_between(policy.subject, policy.target);
        match policy.kind {
            PolicyKind::CannotDependOn => edges
                .into_iter()
                .map(|(from, to)| PolicyViolation {
                    policy: *policy,
                    violator: Violator::Edge { from, to },
                })
                .collect(),
            PolicyKind::MustDependOn if edges.is_empty() => vec![PolicyViolation {
                policy: *policy,
                violator: Violator::MissingDependency,
            }],
            PolicyKind::MustDependOn => Vec::new(),
        }
    }

    /// File-level edges leaving `subject` and landing in `target`.
    fn edges_between(&self, subject: NodeRef, target: NodeRef) -> Vec<(FileId, FileId)> {
        let sources = match subject {
            NodeRef::File(file) => vec![file],
            NodeRef::Package(package) => self.files_in_subtree(package),
        };

        sources
            .into_iter()
            .flat_map(|source| self.dependencies(source).map(move |dest| (source, dest)))
            .filter(|&(_, dest)| match target {
                NodeRef::File(file) => dest == file,
                NodeRef::Package(package) => self.is_in_subtree(self.file(dest).package, package),
            })
            .collect()
    }
}
