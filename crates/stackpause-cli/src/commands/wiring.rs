//! Production collaborators: AWS, ZooKeeper and Solr over HTTP.

use std::sync::Arc;

use tracing::debug;

use stackpause_core::{Notifier, SessionConfig};
use stackpause_fleet::aws::{AwsEnvironmentApi, AwsScalingApi, load_sdk_config};
use stackpause_health::ZkCoordination;
use stackpause_orchestrator::Collaborators;
use stackpause_solr::HttpTransport;

pub async fn collaborators(session: &SessionConfig, notifier: Arc<dyn Notifier>) -> Collaborators {
    let sdk = load_sdk_config().await;
    let zookeeper = ZkCoordination::new(&session.host_for("zk"));
    debug!(
        region = ?sdk.region(),
        zookeeper = zookeeper.address(),
        solr = %session.host_for("solr"),
        "collaborators wired"
    );

    Collaborators {
        scaling: Arc::new(AwsScalingApi::new(&sdk)),
        environments: Arc::new(AwsEnvironmentApi::new(&sdk)),
        solr: Arc::new(HttpTransport::new()),
        coordination: Arc::new(zookeeper),
        notifier,
    }
}
