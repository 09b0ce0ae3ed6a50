// src/resolver/plan.rs

//! Resolution plan data structures
//!
//! Contains the result types for dependency resolution and the installer
//! interface that consumes them.

use std::fmt;

use strum_macros::{AsRefStr, Display};
use tracing::info;

use crate::catalog::RecordRef;

use super::conflict::{ChoiceSet, Conflict, Unresolved};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Install,
    Upgrade,
    Remove,
}

/// Why a step is in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Reason {
    /// Requested by the caller (or auto-selected for upgrade)
    Explicit,
    /// Needed by another planned package
    Dependency,
    /// Removed because a planned package obsoletes it
    Obsoletes,
    /// Removed so that the plan can be installed
    ConflictResolution,
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub action: Action,
    pub package: RecordRef,
    pub reason: Reason,
    /// Installed package replaced by an upgrade, or the planned package
    /// causing a removal
    pub related: Option<RecordRef>,
    /// Steps sharing a component form a dependency cycle and go in together
    pub component: usize,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.action,
            self.package.fullname(),
            self.reason
        )
    }
}

/// Ordered install/remove plan; dependencies come before their dependents
#[derive(Debug, Clone, Default)]
pub struct ResolutionPlan {
    pub steps: Vec<PlanStep>,
}

impl ResolutionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Install and upgrade steps, in order
    pub fn installs(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.action != Action::Remove)
    }

    pub fn removals(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.action == Action::Remove)
    }

    /// Total size of packages going to be installed, in bytes
    pub fn total_size(&self) -> u64 {
        self.installs().map(|s| s.package.size).sum()
    }

    /// Position of the install step for package `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.action != Action::Remove && s.package.name == name)
    }

    pub fn step(&self, name: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.package.name == name)
    }
}

/// Terminal state of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Closed,
    Conflict,
    Unresolvable,
}

/// A selection that was dropped on purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub package: String,
    pub reason: String,
}

/// Everything a resolution produced
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: Outcome,
    pub plan: ResolutionPlan,
    pub unresolved: Vec<Unresolved>,
    pub conflicts: Vec<Conflict>,
    /// Unanswered ambiguities; their branches are not in the plan
    pub choices: Vec<ChoiceSet>,
    pub skipped: Vec<Skipped>,
    pub warnings: Vec<String>,
}

impl Resolution {
    pub fn empty() -> Self {
        Self {
            outcome: Outcome::Closed,
            plan: ResolutionPlan::default(),
            unresolved: Vec::new(),
            conflicts: Vec::new(),
            choices: Vec::new(),
            skipped: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Closed with no pending choice
    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Closed && self.choices.is_empty()
    }
}

/// Result of one plan step as reported by the installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub package: String,
    pub action: Action,
    pub result: Result<(), String>,
}

/// External collaborator executing a plan
///
/// The resolver never retries; failures are reported back per package.
pub trait Installer {
    fn execute(&mut self, plan: &ResolutionPlan) -> Vec<StepReport>;
}

/// Installer that only logs each step and reports success
#[derive(Debug, Default)]
pub struct DryRunInstaller;

impl Installer for DryRunInstaller {
    fn execute(&mut self, plan: &ResolutionPlan) -> Vec<StepReport> {
        plan.steps
            .iter()
            .map(|step| {
                info!("would {} {}", step.action, step.package.fullname());
                StepReport {
                    package: step.package.fullname(),
                    action: step.action,
                    result: Ok(()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PackageRecord;
    use std::sync::Arc;

    fn step(name: &str, size: u64, action: Action, reason: Reason) -> PlanStep {
        PlanStep {
            action,
            package: Arc::new(PackageRecord {
                name: name.to_string(),
                version: "1".to_string(),
                release: "1".to_string(),
                arch: "noarch".to_string(),
                size,
                ..Default::default()
            }),
            reason,
            related: None,
            component: 0,
        }
    }

    #[test]
    fn test_plan_queries() {
        let plan = ResolutionPlan {
            steps: vec![
                step("lib", 100, Action::Install, Reason::Dependency),
                step("app", 50, Action::Upgrade, Reason::Explicit),
                step("old", 70, Action::Remove, Reason::Obsoletes),
            ],
        };
        assert_eq!(plan.total_size(), 150);
        assert_eq!(plan.installs().count(), 2);
        assert_eq!(plan.removals().count(), 1);
        assert_eq!(plan.position("app"), Some(1));
        assert_eq!(plan.position("old"), None);
        assert_eq!(plan.steps[2].to_string(), "remove old-1-1.noarch (obsoletes)");
        assert_eq!(Reason::ConflictResolution.to_string(), "conflict-resolution");
    }

    #[test]
    fn test_dry_run_reports_every_step() {
        let plan = ResolutionPlan {
            steps: vec![step("lib", 1, Action::Install, Reason::Dependency)],
        };
        let reports = DryRunInstaller.execute(&plan);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].package, "lib-1-1.noarch");
        assert!(reports[0].result.is_ok());
    }
}
