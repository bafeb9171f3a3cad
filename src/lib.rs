// src/lib.rs

pub mod aliases;
pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod query;
pub mod report;
pub mod table;

pub use error::{ConfigError, FetchError};
