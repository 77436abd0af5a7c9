//! Readiness gate error types.

use std::time::Duration;

use thiserror::Error;

pub type GateResult<T> = Result<T, GateError>;

/// Errors raised by a single probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("coordination service error: {0}")]
    Coordination(String),
}

/// Errors that end a readiness gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The deadline elapsed before the predicate held.
    #[error("{what} failed to stabilize within {}", describe_budget(.budget))]
    Timeout { what: String, budget: Duration },

    /// The probe failed in a way the retry policy does not retry.
    #[error("{what} probe failed: {source}")]
    Probe {
        what: String,
        #[source]
        source: ProbeError,
    },
}

fn describe_budget(budget: &Duration) -> String {
    let secs = budget.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{s} seconds"),
    }
}
