//! Terminal outcomes of a request cycle
//!
//! A request context ends in exactly one of these once its execution path returns.

use std::fmt;

/// Represents how a request cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// A response classified as success was received and its body consumed
    Succeeded,

    /// A terminal failure: transport error, failure status, or body read error
    Failed,

    /// Every allowed attempt was used up by retries
    RetryBudgetExceeded,

    /// The status code mapped to `start`, `end`, or no category at all
    Stopped {
        /// The HTTP status code that stopped the cycle
        status: u16,
    },
}

impl Outcome {
    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::RetryBudgetExceeded)
    }

    /// Short label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::RetryBudgetExceeded => "retry_budget_exceeded",
            Self::Stopped { .. } => "stopped",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped { status } => write!(f, "stopped (HTTP {})", status),
            other => f.write_str(other.as_str()),
        }
    }
}
