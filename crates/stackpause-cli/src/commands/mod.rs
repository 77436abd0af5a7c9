//! Command execution: load the session, wire collaborators, run, and
//! write the session back when the command calls for it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use stackpause_core::{ConfigError, Notifier, SessionConfig};
use stackpause_orchestrator::{Command, Orchestrator, OrchestratorError};

mod wiring;

/// Run `command` against the stack described by the document at
/// `config_path`.
pub async fn run(
    config_path: &Path,
    command: &Command,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    let session = SessionConfig::from_file(config_path)?;
    let recorded = session.backups.clone();

    let parts = wiring::collaborators(&session, notifier).await;
    let mut orchestrator = Orchestrator::new(session, parts)?;
    let outcome = orchestrator.run(command).await;

    if command.persists_session() {
        settle(config_path, &recorded, &orchestrator.into_session(), outcome)?;
    } else {
        outcome?;
    }
    info!(command = command.name(), "command complete");
    Ok(())
}

/// Write the session back after a persisting command, then surface the
/// command's own outcome.
///
/// A failed command still writes back any backups it recorded. When
/// that write fails too, the command's error is the one returned and the
/// write failure rides along as context.
fn settle(
    path: &Path,
    recorded: &BTreeMap<String, String>,
    session: &SessionConfig,
    outcome: Result<(), OrchestratorError>,
) -> Result<()> {
    if outcome.is_err() && session.backups == *recorded {
        return outcome.map_err(Into::into);
    }

    match (outcome, persist(path, session)) {
        (Ok(()), saved) => saved,
        (Err(err), Ok(())) => Err(err.into()),
        (Err(err), Err(save_err)) => {
            warn!(error = %format!("{save_err:#}"), "session not saved after failed command");
            Err(anyhow::Error::from(err).context(format!("session not saved: {save_err:#}")))
        }
    }
}

fn persist(path: &Path, session: &SessionConfig) -> Result<()> {
    session
        .save(path)
        .with_context(|| format!("recording backups in {}", path.display()))?;
    info!(path = %path.display(), backups = session.backups.len(), "session saved");
    Ok(())
}

/// `<Kind>: <message>` for the notifier.
pub fn fatal_message(err: &anyhow::Error) -> String {
    if let Some(err) = err.downcast_ref::<OrchestratorError>() {
        return err.fatal_message();
    }
    if let Some(err) = err.downcast_ref::<ConfigError>() {
        return format!("ConfigurationError: {err:#}");
    }
    warn!(error = ?err, "unclassified error");
    format!("Error: {err:#}")
}
