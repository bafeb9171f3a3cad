// src/cache.rs
//
// Session-lifetime board cache, keyed by board id. An explicit object owned
// by the engine rather than process-global state; refresh replaces entries
// wholesale, and derived metrics are never memoized, so invalidation is just
// replacement.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::normalize::QualityReport;
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct CachedBoard {
    pub table: Arc<Table>,
    pub quality: Arc<QualityReport>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct BoardCache {
    entries: HashMap<String, CachedBoard>,
}

impl BoardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, board_id: &str) -> Option<&CachedBoard> {
        self.entries.get(board_id)
    }

    pub fn insert(&mut self, board_id: &str, table: Table, quality: QualityReport) -> CachedBoard {
        let entry = CachedBoard {
            table: Arc::new(table),
            quality: Arc::new(quality),
            fetched_at: Utc::now(),
        };
        debug!(board_id, rows = entry.table.len(), "cached board");
        self.entries.insert(board_id.to_string(), entry.clone());
        entry
    }

    pub fn invalidate(&mut self, board_id: &str) -> bool {
        self.entries.remove(board_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
