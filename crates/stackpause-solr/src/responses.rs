//! Typed Solr admin responses, one structure per action family.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResponseHeader {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(rename = "QTime", default)]
    pub qtime: Option<i64>,
}

/// Fields shared by every collections-admin reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminResponse {
    #[serde(rename = "responseHeader", default)]
    pub response_header: Option<ResponseHeader>,
    /// Some actions report `"success": {...}`, others `"success": true`.
    #[serde(default)]
    pub success: Option<Value>,
}

impl AdminResponse {
    /// A truthy `success` or a zero header status.
    pub fn succeeded(&self) -> bool {
        let flagged = matches!(&self.success, Some(v) if !v.is_null() && *v != Value::Bool(false));
        let header_ok = self
            .response_header
            .as_ref()
            .and_then(|h| h.status)
            .is_some_and(|status| status == 0);
        flagged || header_ok
    }
}

/// `action=LIST`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub collections: Vec<String>,
}

// ── CLUSTERSTATUS ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterStatusResponse {
    #[serde(default)]
    pub cluster: ClusterSnapshot,
}

/// Live nodes and the collection → shard → replica map at one instant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub live_nodes: Vec<String>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionState {
    #[serde(default)]
    pub shards: BTreeMap<String, ShardState>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShardState {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub replicas: BTreeMap<String, ReplicaState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaState {
    #[serde(default)]
    pub core: String,
    #[serde(default)]
    pub node_name: String,
    pub state: ReplicaHealth,
    /// Solr sends `"leader": "true"` on the leader only.
    #[serde(default, deserialize_with = "flag")]
    pub leader: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaHealth {
    Active,
    Down,
    Recovering,
    RecoveryFailed,
    #[serde(other)]
    Unknown,
}

/// A shard's current leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderRef {
    pub collection: String,
    pub shard: String,
    pub replica: String,
}

impl ClusterSnapshot {
    pub fn live_node_count(&self) -> usize {
        self.live_nodes.len()
    }

    /// One entry per shard that currently has a leader, in collection
    /// then shard order.
    pub fn leaders(&self) -> Vec<LeaderRef> {
        let mut leaders = Vec::new();
        for (collection, state) in &self.collections {
            for (shard, shard_state) in &state.shards {
                if let Some((replica, _)) = shard_state.replicas.iter().find(|(_, r)| r.leader) {
                    leaders.push(LeaderRef {
                        collection: collection.clone(),
                        shard: shard.clone(),
                        replica: replica.clone(),
                    });
                }
            }
        }
        leaders
    }

    /// Shards with no replica flagged leader.
    pub fn leaderless_shards(&self) -> Vec<(String, String)> {
        self.collections
            .iter()
            .flat_map(|(collection, state)| {
                state
                    .shards
                    .iter()
                    .filter(|(_, s)| !s.replicas.values().any(|r| r.leader))
                    .map(move |(shard, _)| (collection.clone(), shard.clone()))
            })
            .collect()
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => s.eq_ignore_ascii_case("true"),
    })
}

// ── cores STATUS ───────────────────────────────────────────────────

/// `admin/cores?action=STATUS` from one node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreStatusResponse {
    #[serde(default)]
    pub status: BTreeMap<String, CoreStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cloud: Option<CoreKey>,
    #[serde(default)]
    pub index: IndexStats,
}

/// Identifies a core within the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct CoreKey {
    pub collection: String,
    pub shard: String,
    pub replica: String,
}

impl CoreKey {
    /// Recover the key from a generated core name such as
    /// `articles_shard1_replica_n1`.
    pub fn from_core_name(name: &str) -> Option<Self> {
        let at = name.rfind("_shard")?;
        let (collection, rest) = (&name[..at], &name[at + 1..]);
        let (shard, replica) = rest.split_once('_')?;
        if collection.is_empty() || replica.is_empty() {
            return None;
        }
        Some(Self {
            collection: collection.to_string(),
            shard: shard.to_string(),
            replica: replica.to_string(),
        })
    }

    /// Sort key for status reports.
    pub fn concatenated(&self) -> String {
        format!("{}{}{}", self.collection, self.shard, self.replica)
    }
}

impl CoreStatus {
    /// The `cloud` descriptor, or the key encoded in the core name.
    pub fn key(&self, core_name: &str) -> Option<CoreKey> {
        self.cloud.clone().or_else(|| {
            let name = if self.name.is_empty() { core_name } else { &self.name };
            CoreKey::from_core_name(name)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub num_docs: u64,
    #[serde(default)]
    pub max_doc: u64,
    #[serde(default)]
    pub deleted_docs: u64,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub has_deletions: bool,
}
