//! Operator commands: the surface exposed to whatever front end
//! receives them.

use crate::error::OrchestratorResult;
use crate::orchestrator::Orchestrator;

/// One operator request. Each runs to completion or fails; progress is
/// reported only through the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Back up collections, then park every environment.
    Suspend,
    /// Bring every tier back in dependency order and restore collections.
    Resume,
    /// Resume every environment without touching collections.
    ForceUp,
    /// Park every environment without backing anything up.
    ForceDown,
    /// Rebuild one collection from its recorded backup.
    Resolr { collection: String },
    /// Re-elect every shard leader.
    ReplaceLeaders,
    /// Instance counts and health per environment.
    Status,
    /// Per-core index statistics; every live node when `nodes` is empty.
    SolrStatus { nodes: Vec<String> },
    /// Repair replica counts on each collection's first shard.
    Replicate,
    /// List collections.
    Collections,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::ForceUp => "force-up",
            Self::ForceDown => "force-down",
            Self::Resolr { .. } => "resolr",
            Self::ReplaceLeaders => "replace-leaders",
            Self::Status => "status",
            Self::SolrStatus { .. } => "solr-status",
            Self::Replicate => "replicate",
            Self::Collections => "collections",
        }
    }

    /// Whether the session document must be written back afterwards.
    pub fn persists_session(&self) -> bool {
        matches!(self, Self::Suspend)
    }
}

impl Orchestrator {
    /// Dispatch `command`.
    pub async fn run(&mut self, command: &Command) -> OrchestratorResult<()> {
        tracing::info!(command = command.name(), "running command");
        match command {
            Command::Suspend => self.suspend().await,
            Command::Resume => self.resume().await,
            Command::ForceUp => self.force_up().await.map(drop),
            Command::ForceDown => self.force_down().await,
            Command::Resolr { collection } => self.resolr(collection).await.map(drop),
            Command::ReplaceLeaders => self.replace_leaders().await.map(drop),
            Command::Status => self.status().await.map(drop),
            Command::SolrStatus { nodes } => self.solr_status(nodes).await.map(drop),
            Command::Replicate => self.replicate().await,
            Command::Collections => self.collections().await.map(drop),
        }
    }
}
