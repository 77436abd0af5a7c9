//! Orchestrator: drives one command against the stack.
//!
//! Collaborators are built once from the session document and injected
//! into each layer; the session's `collections` and `backups` are the
//! only state that outlives a single call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use stackpause_core::{Notifier, SessionConfig, TierKind};
use stackpause_fleet::{
    CapacityPlanner, EnvironmentApi, EnvironmentStatus, FleetRegistry, ScaleController, ScalingApi,
};
use stackpause_health::{Coordination, ReadinessGates};
use stackpause_solr::{CollectionManager, CollectionsClient, LeaderRef, SolrTransport};

use crate::error::OrchestratorResult;

/// Pause between the search tier passing its gate and the first restore.
pub const SETTLE_DELAY: Duration = Duration::from_secs(15);

/// Where the stack is, as far as this invocation knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorPhase {
    /// No command has run yet.
    Idle,
    /// Backing up and scaling down. Stays here if suspend fails.
    Suspending,
    Suspended,
    /// Bringing tiers back. Stays here if resume fails.
    Resuming,
    Running,
}

/// External handles the orchestrator needs.
pub struct Collaborators {
    pub scaling: Arc<dyn ScalingApi>,
    pub environments: Arc<dyn EnvironmentApi>,
    pub solr: Arc<dyn SolrTransport>,
    pub coordination: Arc<dyn Coordination>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct Orchestrator {
    session: SessionConfig,
    phase: OrchestratorPhase,
    registry: Arc<FleetRegistry>,
    scaler: ScaleController,
    collections: CollectionManager,
    gates: ReadinessGates,
    coordination: Arc<dyn Coordination>,
    notifier: Arc<dyn Notifier>,
    settle_delay: Duration,
}

impl Orchestrator {
    /// Validate `session` and wire the layers together. Fails before any
    /// remote call if the session is invalid.
    pub fn new(session: SessionConfig, parts: Collaborators) -> OrchestratorResult<Self> {
        session.validate()?;

        let registry = Arc::new(FleetRegistry::new(
            parts.scaling,
            parts.environments,
            &session.environment_tag,
        ));
        let scaler = ScaleController::new(
            registry.clone(),
            CapacityPlanner::new(session.scaling.clone()),
            parts.notifier.clone(),
        );
        let client = CollectionsClient::new(
            parts.solr,
            format!("http://{}/solr", session.host_for("solr")),
        );
        let collections = CollectionManager::new(
            client,
            session.solr.backup_location.clone(),
            parts.notifier.clone(),
        );
        let gates = ReadinessGates::standard(parts.coordination.clone(), parts.notifier.clone());

        Ok(Self {
            session,
            phase: OrchestratorPhase::Idle,
            registry,
            scaler,
            collections,
            gates,
            coordination: parts.coordination,
            notifier: parts.notifier,
            settle_delay: SETTLE_DELAY,
        })
    }

    /// Replace the tier → gate table.
    pub fn with_gates(mut self, gates: ReadinessGates) -> Self {
        self.gates = gates;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn phase(&self) -> OrchestratorPhase {
        self.phase
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Hand the session back for persisting.
    pub fn into_session(self) -> SessionConfig {
        self.session
    }

    fn enter(&mut self, phase: OrchestratorPhase) {
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    // ── Suspend / resume ───────────────────────────────────────────

    /// Back up every collection, record the backups in the session, then
    /// park every environment. A backup failure leaves capacity untouched.
    pub async fn suspend(&mut self) -> OrchestratorResult<()> {
        self.enter(OrchestratorPhase::Suspending);
        self.notifier.info("Backing up solr collections");

        let collections = self
            .collections
            .list_collections(&mut self.session.collections)
            .await?;
        let backups = self.collections.backup(&collections).await?;
        info!(collections = backups.len(), "backups recorded");
        // Backups of collections absent from this listing are kept.
        self.session.backups.extend(backups);

        self.notifier.info("Suspending auto-scaling groups");
        self.scaler.scale_down_all().await?;

        self.notifier.info("Suspend complete");
        self.enter(OrchestratorPhase::Suspended);
        Ok(())
    }

    /// Bring tiers back in dependency order, gating coordination and
    /// search, then restore collections before web traffic returns.
    pub async fn resume(&mut self) -> OrchestratorResult<()> {
        self.enter(OrchestratorPhase::Resuming);
        self.notifier.info("Resuming auto-scaling groups");

        for tier in [TierKind::ImageServer, TierKind::Repository] {
            self.scaler.scale_up_tier(tier).await?;
        }
        self.scale_up_gated(TierKind::Coordination).await?;
        self.scale_up_gated(TierKind::Search).await?;

        debug!(delay_secs = self.settle_delay.as_secs(), "letting the search tier settle");
        tokio::time::sleep(self.settle_delay).await;

        let restored = self.collections.restore_all(&self.session.backups).await?;
        info!(restored = restored.len(), "collections restored");
        self.replace_leaders().await?;

        self.scaler.scale_up_tier(TierKind::Web).await?;

        self.notifier.info("Restore complete");
        self.enter(OrchestratorPhase::Running);
        Ok(())
    }

    /// Scale `tier` up and block on its gate, if it has one.
    async fn scale_up_gated(&self, tier: TierKind) -> OrchestratorResult<()> {
        self.scaler.scale_up_tier(tier).await?;
        if let Some(gate) = self.gates.get(tier) {
            let required = self.scaler.required_nodes(tier).await?;
            let probes = gate.wait_ready(required).await?;
            info!(tier = %tier, required, probes, "tier ready");
        }
        Ok(())
    }

    // ── Manual intervention ────────────────────────────────────────

    /// Resume every environment at once, with no backup handling.
    pub async fn force_up(&mut self) -> OrchestratorResult<Vec<String>> {
        let scaled = self.scaler.scale_up_all().await?;
        self.enter(OrchestratorPhase::Running);
        Ok(scaled)
    }

    /// Park every environment, with no backup handling.
    pub async fn force_down(&mut self) -> OrchestratorResult<()> {
        self.scaler.scale_down_all().await?;
        self.enter(OrchestratorPhase::Suspended);
        Ok(())
    }

    /// Rebuild one collection from its recorded backup.
    pub async fn resolr(&self, collection: &str) -> OrchestratorResult<bool> {
        Ok(self
            .collections
            .resolr(collection, &self.session.backups)
            .await?)
    }

    /// Re-elect every shard leader, reporting each one replaced.
    pub async fn replace_leaders(&self) -> OrchestratorResult<usize> {
        let notifier = self.notifier.clone();
        let observer = move |leader: &LeaderRef| {
            notifier.info(&format!(
                "Replacing leader {} of {}/{}",
                leader.replica, leader.collection, leader.shard
            ));
        };
        Ok(self.collections.replace_leaders(&observer).await?)
    }

    pub async fn replicate(&self) -> OrchestratorResult<()> {
        Ok(self.collections.reconcile_replicas().await?)
    }

    // ── Reporting ──────────────────────────────────────────────────

    /// Instance count and health per environment, one line each.
    pub async fn status(&self) -> OrchestratorResult<BTreeMap<String, EnvironmentStatus>> {
        let status = self.registry.status().await?;
        for (environment, EnvironmentStatus { count, health }) in &status {
            let noun = if *count == 1 { "instance" } else { "instances" };
            self.notifier
                .info(&format!("{environment}: {count} {noun} running ({health})"));
        }
        Ok(status)
    }

    /// Core statistics table for `nodes`, or every live node if empty.
    pub async fn solr_status(&self, nodes: &[String]) -> OrchestratorResult<String> {
        let nodes = if nodes.is_empty() {
            self.coordination.live_nodes().await?
        } else {
            nodes.to_vec()
        };
        let report = self.collections.status_report(&nodes).await?;
        self.notifier.info(&report);
        Ok(report)
    }

    /// Collection names, from the session cache or a fresh listing.
    pub async fn collections(&mut self) -> OrchestratorResult<Vec<String>> {
        let collections = self
            .collections
            .list_collections(&mut self.session.collections)
            .await?;
        self.notifier.info(&collections.join(", "));
        Ok(collections)
    }
}
