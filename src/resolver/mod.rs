// src/resolver/mod.rs

//! Dependency resolution
//!
//! Turns a request (names, files, capabilities or "upgrade everything") into
//! an ordered plan of installs, upgrades and removals, using a
//! [`CapabilityIndex`](crate::index::CapabilityIndex) snapshot, the media
//! registry and the installed set.

pub mod conflict;
pub mod engine;
pub mod graph;
pub mod installed;
pub mod plan;
pub mod policy;

use thiserror::Error;

pub use conflict::{ChoiceSet, Conflict, Unresolved};
pub use engine::{Request, Resolver, Selection};
pub use graph::DependencyGraph;
pub use installed::{InstalledSet, INSTALLED_MEDIUM};
pub use plan::{
    Action, DryRunInstaller, Installer, Outcome, PlanStep, Reason, Resolution, ResolutionPlan,
    Skipped, StepReport,
};
pub use policy::{Precedence, ResolvePolicy};

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolution failures
///
/// Outside strict mode only [`ResolveError::NoMediaAvailable`] is returned;
/// the other outcomes are reported in the [`Resolution`].
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no media available for resolution")]
    NoMediaAvailable,

    #[error("unable to satisfy dependencies: {}", join(.missing))]
    Unresolvable { missing: Vec<Unresolved> },

    #[error("conflicts detected: {}", join(.conflicts))]
    Conflict { conflicts: Vec<Conflict> },

    #[error("{}", join(.choices))]
    ChoiceRequired { choices: Vec<ChoiceSet> },
}
