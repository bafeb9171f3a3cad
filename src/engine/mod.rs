// src/engine/mod.rs
//
// Facade tying the client, cache, and alias table together. One engine per
// session; single-threaded request/response per the surrounding app, so the
// cache needs no locking. Fetches are sequential, never parallel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::aliases::SectorAliases;
use crate::cache::{BoardCache, CachedBoard};
use crate::client::BoardClient;
use crate::config::Config;
use crate::error::{ConfigError, FetchError};
use crate::normalize::{normalize, QualityReport};

pub struct Engine {
    client: BoardClient,
    cache: BoardCache,
    aliases: SectorAliases,
    work_orders_board: String,
    deals_board: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSummary {
    pub board: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub quality: QualityReport,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub work_orders: BoardSummary,
    pub deals: BoardSummary,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let aliases = match &config.alias_file {
            Some(path) => SectorAliases::from_yaml_file(path)?,
            None => SectorAliases::builtin(),
        };
        Ok(Engine {
            client: BoardClient::new(config.api_url.clone(), config.api_token.clone()),
            cache: BoardCache::new(),
            aliases,
            work_orders_board: config.work_orders_board.clone(),
            deals_board: config.deals_board.clone(),
        })
    }

    pub fn aliases(&self) -> &SectorAliases {
        &self.aliases
    }

    async fn board(&mut self, board_id: String, force_refresh: bool) -> Result<CachedBoard, FetchError> {
        if !force_refresh {
            if let Some(entry) = self.cache.get(&board_id) {
                return Ok(entry.clone());
            }
        }
        let data = self.client.fetch_board(&board_id).await?;
        let (table, quality) = normalize(&data);
        info!(board = %data.name, rows = table.len(), "board loaded");
        Ok(self.cache.insert(&board_id, table, quality))
    }

    pub async fn work_orders(&mut self, force_refresh: bool) -> Result<CachedBoard, FetchError> {
        let id = self.work_orders_board.clone();
        self.board(id, force_refresh).await
    }

    pub async fn deals(&mut self, force_refresh: bool) -> Result<CachedBoard, FetchError> {
        let id = self.deals_board.clone();
        self.board(id, force_refresh).await
    }

    /// Drop both cached boards and refetch. Every metric computed afterwards
    /// sees only post-refresh data.
    #[instrument(level = "info", skip(self))]
    pub async fn refresh(&mut self) -> Result<(), FetchError> {
        self.cache.clear();
        self.work_orders(true).await?;
        self.deals(true).await?;
        Ok(())
    }

    pub async fn data_summary(&mut self) -> Result<DataSummary, FetchError> {
        let work_orders = self.work_orders(false).await?;
        let deals = self.deals(false).await?;
        Ok(DataSummary {
            work_orders: summarize("Work Orders", &work_orders),
            deals: summarize("Deals", &deals),
        })
    }
}

fn summarize(board: &str, entry: &CachedBoard) -> BoardSummary {
    BoardSummary {
        board: board.to_string(),
        rows: entry.table.len(),
        columns: entry.table.column_names(),
        quality: (*entry.quality).clone(),
        fetched_at: entry.fetched_at,
    }
}
