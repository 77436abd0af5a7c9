//! Fleet error types.

use thiserror::Error;

/// Errors that can occur while discovering or mutating scaling groups.
#[derive(Debug, Error)]
pub enum FleetError {
    /// A cloud API call could not complete. Never retried here.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("no scaling group is tagged for environment `{0}`")]
    UnknownEnvironment(String),
}

pub type FleetResult<T> = Result<T, FleetError>;
