//! Typed wrappers over the collections-admin and cores-admin APIs.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{SolrError, SolrResult};
use crate::responses::{
    AdminResponse, ClusterSnapshot, ClusterStatusResponse, CoreStatusResponse, ListResponse,
};
use crate::transport::SolrTransport;

/// A decoded admin reply plus the raw body for error reports.
#[derive(Debug, Clone)]
pub struct AdminReply {
    pub response: AdminResponse,
    pub raw: Value,
}

impl AdminReply {
    pub fn succeeded(&self) -> bool {
        self.response.succeeded()
    }

    /// Fail with `message` and the raw payload unless the reply succeeded.
    pub fn ensure(self, message: impl Into<String>) -> SolrResult<Self> {
        if self.succeeded() {
            return Ok(self);
        }
        Err(SolrError::Operation {
            message: message.into(),
            payload: serde_json::to_string(&self.raw).unwrap_or_else(|_| self.raw.to_string()),
        })
    }
}

/// Map a live node name (`host:port_solr`) to its base URL.
pub fn node_url(node: &str) -> String {
    let address = node.strip_suffix("_solr").unwrap_or(node);
    format!("http://{address}/solr")
}

pub struct CollectionsClient {
    transport: Arc<dyn SolrTransport>,
    /// e.g. `http://solr.repo.vpc.example.edu/solr`
    base_url: String,
}

impl CollectionsClient {
    pub fn new(transport: Arc<dyn SolrTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn admin(&self, action: &str, args: &[(&str, String)]) -> SolrResult<Value> {
        let url = format!("{}/admin/collections", self.base_url);
        let mut params: Vec<(&str, String)> = args.to_vec();
        params.push(("action", action.to_string()));
        params.push(("wt", "json".to_string()));
        debug!(%action, ?args, "collections admin");
        self.transport.get_json(&url, &params).await
    }

    async fn admin_reply(&self, action: &str, args: &[(&str, String)]) -> SolrResult<AdminReply> {
        let raw = self.admin(action, args).await?;
        let response = decode(&self.base_url, &raw)?;
        Ok(AdminReply { response, raw })
    }

    pub async fn list(&self) -> SolrResult<Vec<String>> {
        let raw = self.admin("LIST", &[]).await?;
        Ok(decode::<ListResponse>(&self.base_url, &raw)?.collections)
    }

    /// A fresh snapshot; never cached.
    pub async fn cluster_status(&self) -> SolrResult<ClusterSnapshot> {
        let raw = self.admin("CLUSTERSTATUS", &[]).await?;
        Ok(decode::<ClusterStatusResponse>(&self.base_url, &raw)?.cluster)
    }

    /// Hard commit and merge segments ahead of a backup. The reply body
    /// is not inspected.
    pub async fn commit_and_optimize(&self, collection: &str) -> SolrResult<()> {
        let url = format!("{}/{collection}/update", self.base_url);
        let params = [
            ("commit", "true".to_string()),
            ("optimize", "true".to_string()),
            ("wt", "json".to_string()),
        ];
        self.transport.get_json(&url, &params).await?;
        Ok(())
    }

    pub async fn backup(
        &self,
        name: &str,
        collection: &str,
        location: &str,
    ) -> SolrResult<AdminReply> {
        self.admin_reply(
            "BACKUP",
            &[
                ("name", name.to_string()),
                ("collection", collection.to_string()),
                ("location", location.to_string()),
            ],
        )
        .await
    }

    pub async fn restore(
        &self,
        name: &str,
        collection: &str,
        location: &str,
        replication_factor: usize,
    ) -> SolrResult<AdminReply> {
        self.admin_reply(
            "RESTORE",
            &[
                ("name", name.to_string()),
                ("collection", collection.to_string()),
                ("location", location.to_string()),
                ("maxShardsPerNode", "1".to_string()),
                ("replicationFactor", replication_factor.to_string()),
            ],
        )
        .await
    }

    pub async fn delete(&self, collection: &str) -> SolrResult<AdminReply> {
        self.admin_reply("DELETE", &[("name", collection.to_string())])
            .await
    }

    pub async fn add_replica(&self, collection: &str, shard: &str) -> SolrResult<AdminReply> {
        self.admin_reply(
            "ADDREPLICA",
            &[
                ("collection", collection.to_string()),
                ("shard", shard.to_string()),
            ],
        )
        .await
    }

    pub async fn delete_replica(
        &self,
        collection: &str,
        shard: &str,
        replica: &str,
    ) -> SolrResult<AdminReply> {
        self.admin_reply(
            "DELETEREPLICA",
            &[
                ("collection", collection.to_string()),
                ("shard", shard.to_string()),
                ("replica", replica.to_string()),
            ],
        )
        .await
    }

    /// Delete `count` replicas of `shard`, leaving the choice to Solr.
    pub async fn delete_replicas(
        &self,
        collection: &str,
        shard: &str,
        count: usize,
    ) -> SolrResult<AdminReply> {
        self.admin_reply(
            "DELETEREPLICA",
            &[
                ("collection", collection.to_string()),
                ("shard", shard.to_string()),
                ("count", count.to_string()),
            ],
        )
        .await
    }

    pub async fn reload(&self, collection: &str) -> SolrResult<AdminReply> {
        self.admin_reply("RELOAD", &[("name", collection.to_string())])
            .await
    }

    /// Core STATUS from a single live node.
    pub async fn core_status(&self, node: &str) -> SolrResult<CoreStatusResponse> {
        let base = node_url(node);
        let url = format!("{base}/admin/cores");
        let params = [
            ("action", "STATUS".to_string()),
            ("wt", "json".to_string()),
        ];
        let raw = self.transport.get_json(&url, &params).await?;
        decode(&base, &raw)
    }
}

fn decode<T: DeserializeOwned>(url: &str, raw: &Value) -> SolrResult<T> {
    serde_json::from_value(raw.clone()).map_err(|e| SolrError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    fn client() -> (Arc<ScriptedTransport>, CollectionsClient) {
        let transport = Arc::new(ScriptedTransport::new());
        let client = CollectionsClient::new(transport.clone(), "http://solr.test/solr/");
        (transport, client)
    }

    #[test]
    fn node_urls() {
        assert_eq!(node_url("10.0.0.1:8983_solr"), "http://10.0.0.1:8983/solr");
        assert_eq!(node_url("10.0.0.1:8983"), "http://10.0.0.1:8983/solr");
    }

    #[tokio::test]
    async fn admin_calls_carry_action_and_wt() {
        let (transport, client) = client();
        client.restore("b1", "articles", "/data/backup", 3).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.url, "http://solr.test/solr/admin/collections");
        assert_eq!(request.action(), Some("RESTORE"));
        assert_eq!(request.param("wt"), Some("json"));
        assert_eq!(request.param("maxShardsPerNode"), Some("1"));
        assert_eq!(request.param("replicationFactor"), Some("3"));
        assert_eq!(request.param("location"), Some("/data/backup"));
    }

    #[tokio::test]
    async fn commit_and_optimize_targets_collection_update() {
        let (transport, client) = client();
        client.commit_and_optimize("articles").await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.url, "http://solr.test/solr/articles/update");
        assert_eq!(request.param("commit"), Some("true"));
        assert_eq!(request.param("optimize"), Some("true"));
    }

    #[tokio::test]
    async fn ensure_carries_raw_payload() {
        let (transport, client) = client();
        transport.on_action("BACKUP", json!({"success": false}));

        let err = client
            .backup("b1", "articles", "/data/backup")
            .await
            .unwrap()
            .ensure("Backup of `articles` failed")
            .unwrap_err();
        assert_eq!(err.to_string(), "Backup of `articles` failed:\n{\"success\":false}");
    }

    #[tokio::test]
    async fn list_without_collections_is_empty() {
        let (_transport, client) = client();
        assert!(client.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_cluster_status_is_decode_error() {
        let (transport, client) = client();
        transport.on_action("CLUSTERSTATUS", json!({"cluster": {"live_nodes": "nope"}}));
        let err = client.cluster_status().await.unwrap_err();
        assert!(matches!(err, SolrError::Decode { .. }));
    }

    #[tokio::test]
    async fn core_status_goes_to_the_node() {
        let (transport, client) = client();
        client.core_status("10.0.0.7:8983_solr").await.unwrap();
        let request = &transport.requests()[0];
        assert_eq!(request.url, "http://10.0.0.7:8983/solr/admin/cores");
        assert_eq!(request.action(), Some("STATUS"));
    }
}
