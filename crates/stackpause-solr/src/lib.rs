//! stackpause-solr: Solr collection lifecycle across a suspend/resume.
//!
//! Collections are backed up to shared storage before the search tier is
//! parked and restored once it is back. Restored collections come up
//! with leaders on whichever node registered first, so leadership is
//! reshuffled by replacing every leader replica.
//!
//! # Layers
//!
//! ```text
//! CollectionManager      backup / restore / resolr / replace_leaders /
//!   │                    reconcile_replicas / status
//!   └── CollectionsClient  typed admin actions (LIST, BACKUP, ...)
//!         └── SolrTransport  GET + JSON decode (hyper in production)
//! ```
//!
//! Admin responses are decoded into explicit structures per action.
//! Success is judged by a truthy top-level `success` or a
//! `responseHeader.status` of 0; Solr uses both depending on the action.

pub mod client;
pub mod error;
pub mod manager;
pub mod report;
pub mod responses;
pub mod transport;

pub use client::CollectionsClient;
pub use error::{SolrError, SolrResult};
pub use manager::{CollectionManager, LeaderObserver, NoopObserver, RestoreOutcome, backup_name};
pub use report::{CoreReport, render_status};
pub use responses::*;
pub use transport::{HttpTransport, ScriptedTransport, SolrRequest, SolrTransport};
