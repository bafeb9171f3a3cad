// src/config.rs
//
// Board identifiers and credentials come in from the environment and are
// handed to the client/engine constructors; the query core never touches
// them.

use std::env;
use std::path::PathBuf;
use url::Url;

use crate::error::ConfigError;

const DEFAULT_API_URL: &str = "https://api.monday.com/v2";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub api_token: String,
    pub work_orders_board: String,
    pub deals_board: String,
    /// Optional YAML sector-alias table; builtin aliases apply when unset.
    pub alias_file: Option<PathBuf>,
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(var))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("BOARD_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Ok(Config {
            api_url: Url::parse(&api_url)?,
            api_token: require("MONDAY_API_TOKEN")?,
            work_orders_board: require("WORK_ORDERS_BOARD_ID")?,
            deals_board: require("DEALS_BOARD_ID")?,
            alias_file: env::var("SECTOR_ALIASES_PATH").ok().map(PathBuf::from),
        })
    }
}
