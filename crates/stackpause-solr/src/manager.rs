//! Collection lifecycle across a suspend/resume cycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use stackpause_core::Notifier;

use crate::client::CollectionsClient;
use crate::error::SolrResult;
use crate::report::{CoreReport, render_status};
use crate::responses::{LeaderRef, ReplicaHealth};

/// Shard reconciled by [`CollectionManager::reconcile_replicas`].
/// Multi-shard collections are not reconciled beyond it.
pub const RECONCILED_SHARD: &str = "shard1";

/// `scaling_<collection>_backup_<YYYYmmddHHMMSS>`
pub fn backup_name(collection: &str, at: NaiveDateTime) -> String {
    format!("scaling_{collection}_backup_{}", at.format("%Y%m%d%H%M%S"))
}

/// Told about each leader just before it is replaced.
pub trait LeaderObserver: Send + Sync {
    fn replacing(&self, leader: &LeaderRef);
}

pub struct NoopObserver;

impl LeaderObserver for NoopObserver {
    fn replacing(&self, _leader: &LeaderRef) {}
}

impl<F> LeaderObserver for F
where
    F: Fn(&LeaderRef) + Send + Sync,
{
    fn replacing(&self, leader: &LeaderRef) {
        self(leader)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    AlreadyPresent,
}

pub struct CollectionManager {
    client: CollectionsClient,
    backup_location: String,
    notifier: Arc<dyn Notifier>,
    /// resolr waits after DELETE and again after RESTORE.
    delete_grace: Duration,
    restore_grace: Duration,
}

impl CollectionManager {
    pub fn new(
        client: CollectionsClient,
        backup_location: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            backup_location: backup_location.into(),
            notifier,
            delete_grace: Duration::from_secs(2),
            restore_grace: Duration::from_secs(5),
        }
    }

    pub fn client(&self) -> &CollectionsClient {
        &self.client
    }

    /// The cached list if non-empty, else LIST (stored into `cache`).
    pub async fn list_collections(&self, cache: &mut Vec<String>) -> SolrResult<Vec<String>> {
        if cache.is_empty() {
            *cache = self.client.list().await?;
            debug!(collections = ?cache, "collection list fetched");
        }
        Ok(cache.clone())
    }

    /// Commit, optimize and back up each collection. Returns collection →
    /// backup name; the first failure aborts the rest.
    pub async fn backup(&self, collections: &[String]) -> SolrResult<BTreeMap<String, String>> {
        let mut backups = BTreeMap::new();
        for collection in collections {
            let name = backup_name(collection, chrono::Local::now().naive_local());

            self.notifier
                .info(&format!("Committing and optimizing: {collection}"));
            self.client.commit_and_optimize(collection).await?;

            self.notifier
                .info(&format!("Backing up collection: {collection}"));
            self.client
                .backup(&name, collection, &self.backup_location)
                .await?
                .ensure(format!("Backup of `{collection}` failed"))?;

            info!(%collection, backup = %name, "collection backed up");
            backups.insert(collection.clone(), name);
        }
        Ok(backups)
    }

    /// Restore `collection` from `backup` unless it already exists.
    pub async fn restore(&self, collection: &str, backup: &str) -> SolrResult<RestoreOutcome> {
        let live_nodes = self.client.cluster_status().await?.live_node_count();

        if self.client.list().await?.iter().any(|c| c == collection) {
            self.notifier.info(&format!(
                "Not restoring collection {collection} because it already exists"
            ));
            return Ok(RestoreOutcome::AlreadyPresent);
        }

        self.notifier
            .info(&format!("Restoring collection: {collection} from {backup}"));

        // Clears a half-created collection left by an earlier attempt.
        let stale = self.client.delete(collection).await?;
        if !stale.succeeded() {
            debug!(%collection, "no stale collection to delete");
        }

        self.client
            .restore(backup, collection, &self.backup_location, live_nodes)
            .await?
            .ensure(format!("Restore of `{collection}` failed"))?;

        info!(%collection, %backup, replication_factor = live_nodes, "collection restored");
        Ok(RestoreOutcome::Restored)
    }

    /// Restore every recorded backup. Returns the collections restored.
    pub async fn restore_all(&self, backups: &BTreeMap<String, String>) -> SolrResult<Vec<String>> {
        let mut restored = Vec::new();
        for (collection, backup) in backups {
            if self.restore(collection, backup).await? == RestoreOutcome::Restored {
                restored.push(collection.clone());
            }
        }
        Ok(restored)
    }

    /// Drop one collection and restore it from its recorded backup, then
    /// replace every leader. Returns `false` when there is no backup.
    pub async fn resolr(
        &self,
        collection: &str,
        backups: &BTreeMap<String, String>,
    ) -> SolrResult<bool> {
        let Some(backup) = backups.get(collection) else {
            self.notifier.info(&format!(
                "Not replacing collection {collection} because no current backup exists."
            ));
            return Ok(false);
        };

        self.notifier
            .info(&format!("Deleting collection: {collection}"));
        let deleted = self.client.delete(collection).await?;
        if !deleted.succeeded() {
            warn!(%collection, response = %deleted.raw, "delete reported failure, restoring anyway");
        }
        tokio::time::sleep(self.delete_grace).await;

        self.restore(collection, backup).await?;
        tokio::time::sleep(self.restore_grace).await;

        self.replace_leaders(&NoopObserver).await?;
        Ok(true)
    }

    /// For every shard, delete its leader replica and add a fresh one so
    /// leadership is re-elected. Returns the number of shards handled.
    pub async fn replace_leaders(&self, observer: &dyn LeaderObserver) -> SolrResult<usize> {
        let cluster = self.client.cluster_status().await?;

        for (collection, shard) in cluster.leaderless_shards() {
            warn!(%collection, %shard, "shard has no leader, skipping");
        }

        let leaders = cluster.leaders();
        for leader in &leaders {
            let LeaderRef {
                collection,
                shard,
                replica,
            } = leader;
            observer.replacing(leader);

            self.client
                .delete_replica(collection, shard, replica)
                .await?
                .ensure(format!(
                    "Deleting leader `{replica}` of `{collection}/{shard}` failed"
                ))?;
            self.client
                .add_replica(collection, shard)
                .await?
                .ensure(format!("Adding a replica to `{collection}/{shard}` failed"))?;
            debug!(%collection, %shard, %replica, "leader replaced");
        }
        Ok(leaders.len())
    }

    /// Bring each collection's first shard to one active replica per live
    /// node: delete down replicas, add the shortfall, then reload.
    pub async fn reconcile_replicas(&self) -> SolrResult<()> {
        let cluster = self.client.cluster_status().await?;
        let live_nodes = cluster.live_node_count();

        for (name, state) in &cluster.collections {
            let Some(shard) = state.shards.get(RECONCILED_SHARD) else {
                warn!(collection = %name, shard = RECONCILED_SHARD, "shard missing, skipping");
                continue;
            };
            let count = |health: ReplicaHealth| {
                shard
                    .replicas
                    .values()
                    .filter(|r| r.state == health)
                    .count()
            };
            let down = count(ReplicaHealth::Down);
            let needed = live_nodes.saturating_sub(count(ReplicaHealth::Active));

            self.notifier.info(&format!(
                "{name}: Removing {down} dead replicas and adding {needed} new replicas"
            ));
            if down > 0 {
                self.client
                    .delete_replicas(name, RECONCILED_SHARD, down)
                    .await?
                    .ensure(format!("Removing dead replicas of `{name}` failed"))?;
            }
            for _ in 0..needed {
                self.client
                    .add_replica(name, RECONCILED_SHARD)
                    .await?
                    .ensure(format!("Adding a replica to `{name}` failed"))?;
            }
            self.client
                .reload(name)
                .await?
                .ensure(format!("Reload of `{name}` failed"))?;
        }
        Ok(())
    }

    /// Index statistics for every core on `nodes`, queried one at a time.
    pub async fn status(&self, nodes: &[String]) -> SolrResult<Vec<CoreReport>> {
        let mut replies = Vec::with_capacity(nodes.len());
        for node in nodes {
            replies.push(self.client.core_status(node).await?);
        }
        Ok(CoreReport::collate(&replies))
    }

    pub async fn status_report(&self, nodes: &[String]) -> SolrResult<String> {
        Ok(render_status(&self.status(nodes).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use serde_json::{Value, json};
    use tokio::time::Instant;

    use crate::error::SolrError;
    use crate::transport::ScriptedTransport;
    use stackpause_core::BufferNotifier;

    fn manager() -> (Arc<ScriptedTransport>, Arc<BufferNotifier>, CollectionManager) {
        let transport = Arc::new(ScriptedTransport::new());
        let notifier = Arc::new(BufferNotifier::new());
        let client = CollectionsClient::new(transport.clone(), "http://solr.test/solr");
        let manager = CollectionManager::new(client, "/data/backup", notifier.clone());
        (transport, notifier, manager)
    }

    fn replica(state: &str, leader: bool) -> Value {
        let mut r = json!({"core": "c", "node_name": "n", "state": state});
        if leader {
            r["leader"] = json!("true");
        }
        r
    }

    fn cluster(live: usize, collections: Value) -> Value {
        let live_nodes: Vec<String> = (1..=live).map(|i| format!("10.0.0.{i}:8983_solr")).collect();
        json!({
            "responseHeader": {"status": 0},
            "cluster": {"live_nodes": live_nodes, "collections": collections}
        })
    }

    fn backups(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(c, b)| (c.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn backup_name_has_fourteen_digit_timestamp() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        assert_eq!(backup_name("articles", at), "scaling_articles_backup_20240307090501");
    }

    #[tokio::test]
    async fn list_collections_uses_cache() {
        let (transport, _, manager) = manager();
        transport.on_action("LIST", json!({"collections": ["articles", "maps"]}));

        let mut cache = Vec::new();
        assert_eq!(manager.list_collections(&mut cache).await.unwrap(), ["articles", "maps"]);
        assert_eq!(cache, ["articles", "maps"]);
        manager.list_collections(&mut cache).await.unwrap();
        assert_eq!(transport.requests().len(), 1);

        let mut preset = vec!["only".to_string()];
        assert_eq!(manager.list_collections(&mut preset).await.unwrap(), ["only"]);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn backup_commits_then_backs_up_each_collection() {
        let (transport, notifier, manager) = manager();
        transport.on_action("BACKUP", json!({"responseHeader": {"status": 0}, "success": {}}));

        let collections = vec!["articles".to_string(), "maps".to_string()];
        let result = manager.backup(&collections).await.unwrap();

        assert_eq!(
            transport.summaries(),
            vec![
                "GET http://solr.test/solr/articles/update",
                "BACKUP articles",
                "GET http://solr.test/solr/maps/update",
                "BACKUP maps",
            ]
        );
        let name = &result["articles"];
        let stamp = name.strip_prefix("scaling_articles_backup_").unwrap();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));

        let request = &transport.requests()[1];
        assert_eq!(request.param("name"), Some(name.as_str()));
        assert_eq!(request.param("location"), Some("/data/backup"));
        assert!(notifier.contains("Backing up collection: maps"));
    }

    #[tokio::test]
    async fn failed_backup_names_the_collection_and_stops() {
        let (transport, _, manager) = manager();
        transport.on_action("BACKUP", json!({"success": false}));

        let collections = vec!["articles".to_string(), "maps".to_string()];
        let err = manager.backup(&collections).await.unwrap_err();

        assert!(matches!(err, SolrError::Operation { .. }));
        assert!(err.to_string().contains("Backup of `articles` failed"));
        assert!(err.to_string().contains(r#"{"success":false}"#));
        assert!(!transport.summaries().iter().any(|s| s.contains("maps")));
    }

    #[tokio::test]
    async fn restore_all_skips_existing_and_restores_the_rest() {
        let (transport, notifier, manager) = manager();
        transport
            .on_action("CLUSTERSTATUS", cluster(3, json!({})))
            .on_action("LIST", json!({"collections": ["maps"]}))
            .on_collection_action("DELETE", "articles", json!({"responseHeader": {"status": 400}}));

        let restored = manager
            .restore_all(&backups(&[
                ("articles", "scaling_articles_backup_20240101000000"),
                ("maps", "scaling_maps_backup_20240101000000"),
            ]))
            .await
            .unwrap();

        assert_eq!(restored, ["articles"]);
        assert_eq!(transport.mutations(), vec!["DELETE articles", "RESTORE articles"]);

        let restore = transport
            .requests()
            .into_iter()
            .find(|r| r.action() == Some("RESTORE"))
            .unwrap();
        assert_eq!(restore.param("name"), Some("scaling_articles_backup_20240101000000"));
        assert_eq!(restore.param("maxShardsPerNode"), Some("1"));
        assert_eq!(restore.param("replicationFactor"), Some("3"));
        assert!(notifier.contains("Not restoring collection maps because it already exists"));
    }

    #[tokio::test]
    async fn failed_restore_carries_payload() {
        let (transport, _, manager) = manager();
        transport.on_action("RESTORE", json!({"responseHeader": {"status": 500}, "error": "no such backup"}));

        let err = manager
            .restore_all(&backups(&[("articles", "b")]))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Restore of `articles` failed:\n"));
        assert!(message.contains("no such backup"));
    }

    #[tokio::test]
    async fn resolr_without_backup_is_a_noop() {
        let (transport, notifier, manager) = manager();

        let replaced = manager
            .resolr("missing", &backups(&[("articles", "b")]))
            .await
            .unwrap();

        assert!(!replaced);
        assert!(transport.requests().is_empty());
        assert!(notifier.contains("Not replacing collection missing because no current backup exists."));
    }

    #[tokio::test(start_paused = true)]
    async fn resolr_deletes_waits_restores_and_replaces_leaders() {
        let (transport, _, manager) = manager();
        transport.on_action(
            "CLUSTERSTATUS",
            cluster(
                2,
                json!({"articles": {"shards": {"shard1": {"replicas": {
                    "core_node1": replica("active", true),
                    "core_node2": replica("active", false),
                }}}}}),
            ),
        );

        let start = Instant::now();
        let replaced = manager
            .resolr("articles", &backups(&[("articles", "b1")]))
            .await
            .unwrap();

        assert!(replaced);
        assert_eq!(start.elapsed(), Duration::from_secs(7));
        assert_eq!(
            transport.mutations(),
            vec![
                "DELETE articles",
                "DELETE articles",
                "RESTORE articles",
                "DELETEREPLICA articles/shard1",
                "ADDREPLICA articles/shard1",
            ]
        );
    }

    #[tokio::test]
    async fn replace_leaders_deletes_then_adds_once_per_shard() {
        let (transport, _, manager) = manager();
        transport.on_action(
            "CLUSTERSTATUS",
            cluster(
                2,
                json!({
                    "articles": {"shards": {
                        "shard1": {"replicas": {
                            "core_node1": replica("active", false),
                            "core_node2": replica("active", true),
                        }},
                        "shard2": {"replicas": {
                            "core_node3": replica("active", true),
                        }}
                    }},
                    "maps": {"shards": {"shard1": {"replicas": {
                        "core_node7": replica("active", true),
                    }}}}
                }),
            ),
        );

        let seen = Mutex::new(Vec::new());
        let observer = |leader: &LeaderRef| {
            seen.lock().unwrap().push(format!(
                "{}/{}/{}",
                leader.collection, leader.shard, leader.replica
            ));
        };
        let count = manager.replace_leaders(&observer).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "articles/shard1/core_node2",
                "articles/shard2/core_node3",
                "maps/shard1/core_node7",
            ]
        );
        assert_eq!(
            transport.mutations(),
            vec![
                "DELETEREPLICA articles/shard1",
                "ADDREPLICA articles/shard1",
                "DELETEREPLICA articles/shard2",
                "ADDREPLICA articles/shard2",
                "DELETEREPLICA maps/shard1",
                "ADDREPLICA maps/shard1",
            ]
        );
        let deletes: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.action() == Some("DELETEREPLICA"))
            .map(|r| r.param("replica").map(str::to_string))
            .collect();
        assert_eq!(
            deletes,
            vec![
                Some("core_node2".to_string()),
                Some("core_node3".to_string()),
                Some("core_node7".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn replace_leaders_skips_leaderless_shards() {
        let (transport, _, manager) = manager();
        transport.on_action(
            "CLUSTERSTATUS",
            cluster(
                1,
                json!({"articles": {"shards": {"shard1": {"replicas": {
                    "core_node1": replica("down", false),
                }}}}}),
            ),
        );

        assert_eq!(manager.replace_leaders(&NoopObserver).await.unwrap(), 0);
        assert!(transport.mutations().is_empty());
    }

    #[tokio::test]
    async fn reconcile_removes_down_and_fills_to_live_nodes() {
        let (transport, notifier, manager) = manager();
        transport.on_action(
            "CLUSTERSTATUS",
            cluster(
                3,
                json!({"articles": {"shards": {"shard1": {"replicas": {
                    "core_node1": replica("active", true),
                    "core_node2": replica("down", false),
                    "core_node3": replica("down", false),
                }}}}}),
            ),
        );

        manager.reconcile_replicas().await.unwrap();

        assert!(notifier.contains("articles: Removing 2 dead replicas and adding 2 new replicas"));
        assert_eq!(
            transport.mutations(),
            vec![
                "DELETEREPLICA articles/shard1",
                "ADDREPLICA articles/shard1",
                "ADDREPLICA articles/shard1",
                "RELOAD articles",
            ]
        );
        let delete = transport
            .requests()
            .into_iter()
            .find(|r| r.action() == Some("DELETEREPLICA"))
            .unwrap();
        assert_eq!(delete.param("count"), Some("2"));
    }

    #[tokio::test]
    async fn reconcile_healthy_collection_only_reloads() {
        let (transport, _, manager) = manager();
        transport.on_action(
            "CLUSTERSTATUS",
            cluster(
                2,
                json!({"articles": {"shards": {"shard1": {"replicas": {
                    "core_node1": replica("active", true),
                    "core_node2": replica("active", false),
                }}}}}),
            ),
        );

        manager.reconcile_replicas().await.unwrap();
        assert_eq!(transport.mutations(), vec!["RELOAD articles"]);
    }

    #[tokio::test]
    async fn status_queries_each_node_in_turn() {
        let (transport, _, manager) = manager();
        transport
            .on_url(
                "10.0.0.1:8983/solr/admin/cores",
                json!({"status": {"maps_shard1_replica_n1": {"index": {"numDocs": 5}}}}),
            )
            .on_url(
                "10.0.0.2:8983/solr/admin/cores",
                json!({"status": {"articles_shard1_replica_n2": {"index": {"numDocs": 9}}}}),
            );

        let nodes = vec!["10.0.0.1:8983_solr".to_string(), "10.0.0.2:8983_solr".to_string()];
        let rows = manager.status(&nodes).await.unwrap();

        assert_eq!(transport.summaries(), vec!["STATUS", "STATUS"]);
        assert_eq!(rows[0].key.collection, "articles");
        assert_eq!(rows[1].key.collection, "maps");

        let report = manager.status_report(&nodes).await.unwrap();
        assert!(report.find("articles").unwrap() < report.find("maps").unwrap());
    }
}
