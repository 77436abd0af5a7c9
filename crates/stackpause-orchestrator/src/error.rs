//! Orchestrator error types.

use thiserror::Error;

use stackpause_core::ConfigError;
use stackpause_fleet::FleetError;
use stackpause_health::{GateError, ProbeError};
use stackpause_solr::SolrError;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Any error that ends a command.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fleet(#[from] FleetError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Solr(#[from] SolrError),

    #[error("could not list live solr nodes: {0}")]
    Coordination(#[from] ProbeError),
}

impl OrchestratorError {
    /// Operator-facing error class, prefixed to fatal notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Fleet(FleetError::UnknownEnvironment(_)) => {
                "ConfigurationError"
            }
            Self::Fleet(FleetError::Connectivity(_))
            | Self::Gate(GateError::Probe { .. })
            | Self::Solr(SolrError::Transport(_))
            | Self::Coordination(_) => "ConnectivityError",
            Self::Gate(GateError::Timeout { .. }) => "StabilizationTimeoutError",
            Self::Solr(SolrError::Operation { .. } | SolrError::Decode { .. }) => {
                "SolrOperationError"
            }
        }
    }

    /// `<kind>: <message>`
    pub fn fatal_message(&self) -> String {
        format!("{}: {self}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn kinds() {
        let timeout: OrchestratorError = GateError::Timeout {
            what: "Solr".into(),
            budget: Duration::from_secs(600),
        }
        .into();
        assert_eq!(timeout.kind(), "StabilizationTimeoutError");
        assert_eq!(
            timeout.fatal_message(),
            "StabilizationTimeoutError: Solr failed to stabilize within 10 minutes"
        );

        let fleet: OrchestratorError = FleetError::Connectivity("throttled".into()).into();
        assert_eq!(fleet.kind(), "ConnectivityError");

        let unknown: OrchestratorError = FleetError::UnknownEnvironment("x".into()).into();
        assert_eq!(unknown.kind(), "ConfigurationError");

        let solr: OrchestratorError = SolrError::Operation {
            message: "Backup of `articles` failed".into(),
            payload: "{}".into(),
        }
        .into();
        assert_eq!(solr.fatal_message(), "SolrOperationError: Backup of `articles` failed:\n{}");

        let config: OrchestratorError = ConfigError::MissingDnsZone.into();
        assert_eq!(config.kind(), "ConfigurationError");
    }
}
