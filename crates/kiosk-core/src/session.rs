//! Per-operation session state.
//!
//! A `Session` is created at the start of every top-level operation and
//! threaded through every deployer call, replacing any notion of global
//! mutable state. It accumulates non-fatal errors (side effects that
//! failed, artifacts found missing) and the set of files already
//! checked during verification, and is consumed into the operation's
//! final [`OpReport`].

use crate::error::EngineError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Mutable state for one top-level operation.
#[derive(Debug)]
pub struct Session {
    operation: &'static str,
    errors: Vec<EngineError>,
    checked: HashSet<PathBuf>,
}

impl Session {
    /// Start a session for the named operation.
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            errors: Vec::new(),
            checked: HashSet::new(),
        }
    }

    /// Record a non-fatal error and continue.
    pub fn record(&mut self, err: EngineError) {
        tracing::error!("{err}");
        self.errors.push(err);
    }

    /// Note that `path` has been checked in this session.
    ///
    /// Returns `true` the first time a path is seen, `false` for
    /// repeats, so shared artifacts are only hashed once per operation.
    pub fn first_check(&mut self, path: &Path) -> bool {
        self.checked.insert(path.to_path_buf())
    }

    /// True if nothing has been recorded yet.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume the session into the operation report.
    pub fn into_report(self) -> OpReport {
        OpReport {
            operation: self.operation,
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Outcome of a top-level operation: a success flag plus the
/// consolidated, human-readable error summary. Nothing recorded during
/// the operation is dropped.
#[derive(Debug, Clone)]
pub struct OpReport {
    /// Name of the operation that produced this report.
    pub operation: &'static str,
    /// Accumulated error lines, in occurrence order.
    pub errors: Vec<String>,
}

impl OpReport {
    /// True if the operation completed without recorded errors.
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Multi-line summary for the caller.
    pub fn summary(&self) -> String {
        if self.errors.is_empty() {
            format!("{} completed.", self.operation)
        } else {
            let mut out = format!(
                "{} partially completed. Tasks needing manual attention:",
                self.operation
            );
            for line in &self.errors {
                out.push_str("\n  ");
                out.push_str(line);
            }
            out
        }
    }
}

impl std::fmt::Display for OpReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}
