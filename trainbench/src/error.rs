use crate::ledger::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use trainbench_core::{CoreError, EndpointKind};

/// Error severity classes, ordered by impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Integrity violation. A single one fails the phase.
    Critical,
    /// A scripted step failed because of the service's business logic.
    Application,
    Timeout,
    /// Transient network failure.
    Temporary,
}

impl Severity {
    pub fn suffix(&self) -> &'static str {
        match self {
            Severity::Critical => " (critical error)",
            Severity::Application => "",
            Severity::Timeout => " (timeout)",
            Severity::Temporary => " (temporary error)",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Critical => "critical",
            Severity::Application => "application",
            Severity::Timeout => "timeout",
            Severity::Temporary => "temporary",
        };
        write!(f, "{name}")
    }
}

/// Failure reported by a service or payment client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("could not build request: {0}")]
    Request(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ClientError::Timeout => Severity::Timeout,
            ClientError::Transport(_) => Severity::Temporary,
            ClientError::Status { .. } => Severity::Application,
            ClientError::Decode(_) | ClientError::Request(_) => Severity::Critical,
        }
    }
}

/// A classified failure observed during a benchmark.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct BenchError {
    pub severity: Severity,
    pub message: String,
}

impl BenchError {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(Severity::Application, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(Severity::Timeout, message)
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::new(Severity::Temporary, message)
    }

    /// Classifies a client failure on the given endpoint.
    pub fn from_client(kind: EndpointKind, err: ClientError) -> Self {
        Self::new(err.severity(), format!("{kind}: {err}"))
    }

    /// The message as recorded in a tally, including the severity suffix.
    pub fn display_message(&self) -> String {
        format!("{}{}", self.message, self.severity.suffix())
    }
}

impl From<CoreError> for BenchError {
    fn from(err: CoreError) -> Self {
        Self::critical(err.to_string())
    }
}

impl From<LedgerError> for BenchError {
    fn from(err: LedgerError) -> Self {
        Self::critical(err.to_string())
    }
}
