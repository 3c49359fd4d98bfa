//! Non-fatal diagnostics collected while seeding and scanning.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Info => write!(f, "info: {}", self.message),
            Severity::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

/// Capped diagnostic collector shared by every stage of one analysis run.
///
/// Once `capacity` entries are held, further issues are only counted; the
/// snapshot then ends with an "N more issues omitted" line.
#[derive(Debug, Clone)]
pub struct IssueSink {
    issues: Vec<Issue>,
    capacity: usize,
    omitted: usize,
}

impl IssueSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            issues: Vec::new(),
            capacity,
            omitted: 0,
        }
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => debug!(%message, "analysis issue"),
            Severity::Warning => warn!(%message, "analysis issue"),
        }
        if self.issues.len() < self.capacity {
            self.issues.push(Issue { severity, message });
        } else {
            self.omitted += 1;
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    /// Number of issues reported, including omitted ones.
    pub fn total(&self) -> usize {
        self.issues.len() + self.omitted
    }

    pub fn omitted(&self) -> usize {
        self.omitted
    }

    pub fn retained(&self) -> &[Issue] {
        &self.issues
    }

    /// Retained issues plus the trailing omission summary, if any.
    pub fn snapshot(&self) -> Vec<Issue> {
        let mut out = self.issues.clone();
        if self.omitted > 0 {
            out.push(Issue {
                severity: Severity::Info,
                message: format!("{} more issues omitted", self.omitted),
            });
        }
        out
    }
}

impl Default for IssueSink {
    fn default() -> Self {
        Self::new(32)
    }
}
