//! Per-core index statistics table.

use std::collections::BTreeMap;

use comfy_table::presets::ASCII_FULL;
use comfy_table::{CellAlignment, Table};

use crate::responses::{CoreKey, CoreStatusResponse, IndexStats};

/// One row of the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreReport {
    pub key: CoreKey,
    pub index: IndexStats,
}

impl CoreReport {
    /// Flatten per-node STATUS replies into rows, one per core key, sorted
    /// by the concatenation of collection, shard and replica. A core seen
    /// on several nodes keeps the last reading.
    pub fn collate<'a>(replies: impl IntoIterator<Item = &'a CoreStatusResponse>) -> Vec<Self> {
        let mut by_key: BTreeMap<CoreKey, IndexStats> = BTreeMap::new();
        for reply in replies {
            for (core_name, core) in &reply.status {
                if let Some(key) = core.key(core_name) {
                    by_key.insert(key, core.index.clone());
                }
            }
        }

        let mut rows: Vec<Self> = by_key
            .into_iter()
            .map(|(key, index)| Self { key, index })
            .collect();
        rows.sort_by_cached_key(|row| row.key.concatenated());
        rows
    }
}

const HEADER: [&str; 8] = [
    "collection",
    "shard",
    "replica",
    "numDocs",
    "maxDoc",
    "deletedDocs",
    "current",
    "hasDeletions",
];

pub fn render_status(rows: &[CoreReport]) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_FULL).set_header(HEADER);

    for row in rows {
        table.add_row(vec![
            row.key.collection.clone(),
            row.key.shard.clone(),
            row.key.replica.clone(),
            row.index.num_docs.to_string(),
            row.index.max_doc.to_string(),
            row.index.deleted_docs.to_string(),
            row.index.current.to_string(),
            row.index.has_deletions.to_string(),
        ]);
    }
    for column in 3..6 {
        if let Some(col) = table.column_mut(column) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    table.to_string()
}
