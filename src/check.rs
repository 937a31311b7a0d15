//! Pre-publish location checks.
//!
//! Walks every location a manifest references (each version of each
//! language of each entry) and reports:
//!
//! | Problem | Severity |
//! |---|---|
//! | empty location | error |
//! | `..`, `\` or a leading `/` | error |
//! | no such file under the content root | error |
//! | location referenced more than once | warning |
//!
//! The file-existence check only runs when a content root is given.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{Kind, Manifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Problem {
    EmptyLocation,
    UnsafePath,
    Missing { path: PathBuf },
    /// Same location already used by `first_key`.
    Duplicate { first_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub key: String,
    pub lang: String,
    pub location: String,
    pub problem: Problem,
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self.problem {
            Problem::Duplicate { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity() {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
        };
        write!(f, "{label}: '{}' [{}] ", self.key, self.lang)?;
        match &self.problem {
            Problem::EmptyLocation => f.write_str("has an empty location"),
            Problem::UnsafePath => {
                write!(f, "location contains invalid path components: {}", self.location)
            }
            Problem::Missing { path } => write!(f, "location does not exist: {}", path.display()),
            Problem::Duplicate { first_key } => {
                write!(f, "duplicate location {} (first used by '{first_key}')", self.location)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub issues: Vec<Issue>,
    /// Number of locations inspected.
    pub checked: usize,
}

impl CheckReport {
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// No errors. Warnings do not fail a check.
    pub fn is_ok(&self) -> bool {
        self.errors().next().is_none()
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{issue}")?;
        }
        let errors = self.errors().count();
        if errors == 0 {
            write!(f, "All {} locations look good.", self.checked)
        } else {
            write!(f, "Completed with {errors} problem(s).")
        }
    }
}

/// Check every location in `manifest`. With `root`, each location must
/// also name an existing file under it.
pub fn check_locations(kind: Kind, manifest: &Manifest, root: Option<&Path>) -> CheckReport {
    let mut report = CheckReport::default();
    let mut seen: HashMap<&str, &str> = HashMap::new();

    for (key, entry) in manifest.iter() {
        for (lang, value) in entry {
            let locations = match kind {
                Kind::Index => value.versions(),
                Kind::Tabs => vec![value.title_and_location().1],
            };
            for location in locations {
                report.checked += 1;
                let mut issue = |problem| {
                    report.issues.push(Issue {
                        key: key.to_string(),
                        lang: lang.clone(),
                        location: location.to_string(),
                        problem,
                    })
                };

                if location.is_empty() {
                    issue(Problem::EmptyLocation);
                    continue;
                }
                if is_unsafe(location) {
                    issue(Problem::UnsafePath);
                } else if let Some(root) = root {
                    let path = root.join(location);
                    if !path.is_file() {
                        issue(Problem::Missing { path });
                    }
                }
                match seen.get(location) {
                    Some(first) => issue(Problem::Duplicate {
                        first_key: first.to_string(),
                    }),
                    None => {
                        seen.insert(location, key);
                    }
                }
            }
        }
    }

    debug!(
        "Checked {} {} locations: {} issue(s)",
        report.checked,
        kind,
        report.issues.len()
    );
    report
}

fn is_unsafe(location: &str) -> bool {
    location.contains("..") || location.contains('\\') || location.starts_with('/')
}
