//! ZooKeeper access for readiness probes and node discovery.
//!
//! Two reads are needed: the `mntr` four-letter-word diagnostic (raw
//! socket, tab-separated `key\tvalue` lines) and the children of
//! `/live_nodes`, which Solr registers as ephemeral nodes.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ProbeError;

/// Path under which Solr nodes register themselves.
pub const LIVE_NODES_PATH: &str = "/live_nodes";

/// ZooKeeper client port.
pub const ZOOKEEPER_PORT: u16 = 2181;

#[async_trait]
pub trait Coordination: Send + Sync {
    /// `mntr` reading. Never fails: an unreachable or slow server yields
    /// `{"zk_state": "unavailable"}`.
    async fn server_state(&self) -> BTreeMap<String, String>;

    /// Names of the live Solr nodes.
    async fn live_nodes(&self) -> Result<Vec<String>, ProbeError>;
}

/// Reading returned when the diagnostic port cannot be queried.
pub fn unavailable_state() -> BTreeMap<String, String> {
    BTreeMap::from([("zk_state".to_string(), "unavailable".to_string())])
}

/// Parse `mntr` output into a key/value map.
pub fn parse_mntr(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim_end().split_once('\t')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

pub struct ZkCoordination {
    /// `host:port` of the ensemble.
    address: String,
    probe_timeout: Duration,
    /// Session kept across calls; dropped on error so the next call
    /// reconnects.
    session: Mutex<Option<zookeeper_client::Client>>,
}

impl ZkCoordination {
    pub fn new(host: &str) -> Self {
        Self {
            address: format!("{host}:{ZOOKEEPER_PORT}"),
            probe_timeout: Duration::from_secs(5),
            session: Mutex::new(None),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn mntr(&self) -> Result<String, ProbeError> {
        let mut stream = TcpStream::connect(&self.address).await?;
        stream.write_all(b"mntr\n").await?;
        let mut output = String::new();
        stream.read_to_string(&mut output).await?;
        Ok(output)
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, ProbeError> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            let client = zookeeper_client::Client::connect(&self.address)
                .await
                .map_err(|e| ProbeError::Coordination(e.to_string()))?;
            debug!(address = %self.address, "zookeeper session established");
            *session = Some(client);
        }

        let Some(client) = session.as_ref() else {
            return Err(ProbeError::Coordination("no zookeeper session".to_string()));
        };
        match client.get_children(path).await {
            Ok((children, _stat)) => Ok(children),
            Err(e) => {
                *session = None;
                Err(ProbeError::Coordination(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Coordination for ZkCoordination {
    async fn server_state(&self) -> BTreeMap<String, String> {
        match tokio::time::timeout(self.probe_timeout, self.mntr()).await {
            Ok(Ok(output)) => parse_mntr(&output),
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "mntr failed");
                unavailable_state()
            }
            Err(_) => {
                debug!(address = %self.address, "mntr timed out");
                unavailable_state()
            }
        }
    }

    async fn live_nodes(&self) -> Result<Vec<String>, ProbeError> {
        tokio::time::timeout(self.probe_timeout, self.children(LIVE_NODES_PATH))
            .await
            .map_err(|_| ProbeError::Timeout(self.probe_timeout))?
    }
}
