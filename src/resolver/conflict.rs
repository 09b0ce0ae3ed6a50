// src/resolver/conflict.rs

//! Conflict and failure types for dependency resolution

use std::fmt;

/// A conflict the resolver could not settle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Two packages of the plan conflict
    Planned {
        package: String,
        conflicts_with: String,
        capability: String,
    },
    /// A planned package conflicts with an installed package that stays
    Installed {
        package: String,
        installed: String,
        capability: String,
    },
    /// A requirement needs another version of a package already in the plan
    IncompatibleVersions {
        planned: String,
        required: String,
        required_by: String,
    },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::Planned {
                package,
                conflicts_with,
                capability,
            } => write!(
                f,
                "{} conflicts with {} (on {})",
                package, conflicts_with, capability
            ),
            Conflict::Installed {
                package,
                installed,
                capability,
            } => write!(
                f,
                "{} conflicts with installed {} (on {})",
                package, installed, capability
            ),
            Conflict::IncompatibleVersions {
                planned,
                required,
                required_by,
            } => write!(
                f,
                "{} requires {} but {} is already selected",
                required_by, required, planned
            ),
        }
    }
}

/// A capability no active medium provides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub capability: String,
    /// Package whose requirement failed; None for an explicit selection
    pub required_by: Option<String>,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.required_by {
            Some(by) => write!(f, "{} (required by {})", self.capability, by),
            None => write!(f, "no package named {}", self.capability),
        }
    }
}

/// Several packages can satisfy a requirement and none is preferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSet {
    pub capability: String,
    pub required_by: Option<String>,
    /// Candidate package names
    pub candidates: Vec<String>,
}

impl fmt::Display for ChoiceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "One of the following packages is needed for {}: {}",
            self.capability,
            self.candidates.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let missing = Unresolved {
            capability: "libbar".to_string(),
            required_by: Some("foo-1-1.i586".to_string()),
        };
        assert_eq!(missing.to_string(), "libbar (required by foo-1-1.i586)");

        let unknown = Unresolved {
            capability: "nosuch".to_string(),
            required_by: None,
        };
        assert_eq!(unknown.to_string(), "no package named nosuch");

        let choice = ChoiceSet {
            capability: "webserver".to_string(),
            required_by: None,
            candidates: vec!["apache".to_string(), "nginx".to_string()],
        };
        assert!(choice.to_string().ends_with("webserver: apache, nginx"));
    }
}
