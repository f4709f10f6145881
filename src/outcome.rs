//! Success/failure values threaded through a test run.
//!
//! Every step, collaborator and predicate returns an [`Outcome`]. The standard
//! `Result` combinators (`and_then`, `or_else`, `map`, `map_err`, `unwrap`,
//! `unwrap_err`) carry the short-circuit semantics the runner relies on;
//! [`OutcomeExt`] adds the two that `Result` does not spell the same way.

use serde_json::Value;

/// Result type used by every step of a run.
pub type Outcome<T> = Result<T, Failure>;

/// Why a step, collaborator or predicate failed.
///
/// Each variant is one class of the error taxonomy. The display form is the
/// bare diagnostic message, which is what the run report prints.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// A port was closed, a connect was refused or no connection is open.
    #[error("{0}")]
    Connectivity(String),

    /// A response lacked `result`, carried `error`, or could not be decoded.
    #[error("{0}")]
    Protocol(String),

    /// A value was read successfully but does not (yet) satisfy a condition.
    #[error("{0}")]
    Predicate(String),

    /// A bounded retry or wait budget ran out.
    #[error("{0}")]
    Exhausted(String),

    /// A block, request or message lacked an expected field.
    #[error("{0}")]
    Structure(String),

    /// A local collaborator (file, process listing) failed.
    #[error("{0}")]
    Io(String),
}

impl Failure {
    /// Short name of the failure class, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "connectivity",
            Self::Protocol(_) => "protocol",
            Self::Predicate(_) => "predicate",
            Self::Exhausted(_) => "exhausted",
            Self::Structure(_) => "structure",
            Self::Io(_) => "io",
        }
    }

    /// The diagnostic message without the class.
    pub fn message(&self) -> &str {
        match self {
            Self::Connectivity(m)
            | Self::Protocol(m)
            | Self::Predicate(m)
            | Self::Exhausted(m)
            | Self::Structure(m)
            | Self::Io(m) => m,
        }
    }
}

/// Combinators missing from `Result` under the names the harness uses.
pub trait OutcomeExt<T> {
    /// Unwrap the value, or compute a fallback from the failure.
    fn get_or<F>(self, default: F) -> T
    where
        F: FnOnce(Failure) -> T;

    /// Debug inspection hook: logs the live payload and passes it through.
    fn inspect_debug(self) -> Self;
}

impl<T: std::fmt::Debug> OutcomeExt<T> for Outcome<T> {
    fn get_or<F>(self, default: F) -> T
    where
        F: FnOnce(Failure) -> T,
    {
        self.unwrap_or_else(default)
    }

    fn inspect_debug(self) -> Self {
        match &self {
            Ok(value) => tracing::debug!(?value, "outcome.ok"),
            Err(failure) => tracing::debug!(kind = failure.kind(), %failure, "outcome.err"),
        }
        self
    }
}

/// Render a step payload for the run report.
///
/// Strings print without JSON quoting; everything else prints as compact JSON.
pub fn display_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
