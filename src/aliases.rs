// src/aliases.rs
//
// Sector terms users type rarely match the board's canonical sector labels
// ("energy" vs "Renewables"). The mapping is an explicit, versioned table
// consulted by the filter layer, overridable from a YAML file, instead of
// behavior buried in prompt text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorAliases {
    pub version: u32,
    /// user term (lowercased) -> canonical sector label
    aliases: HashMap<String, String>,
}

impl SectorAliases {
    /// The built-in v1 table.
    pub fn builtin() -> Self {
        let mut aliases = HashMap::new();
        aliases.insert("energy".to_string(), "Renewables".to_string());
        aliases.insert("infra".to_string(), "Infrastructure".to_string());
        SectorAliases {
            version: 1,
            aliases,
        }
    }

    /// Load an alias table from a YAML file:
    ///
    /// ```yaml
    /// version: 2
    /// aliases:
    ///   energy: Renewables
    ///   solar: Renewables
    /// ```
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::AliasFile {
            path: path.display().to_string(),
            source,
        })?;
        let mut table: SectorAliases =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::AliasParse {
                path: path.display().to_string(),
                source,
            })?;
        table.aliases = table
            .aliases
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        info!(version = table.version, entries = table.aliases.len(), path = %path.display(), "loaded sector aliases");
        Ok(table)
    }

    /// Canonical sector label for a user term, or the term itself when no
    /// alias applies.
    pub fn resolve<'a>(&'a self, term: &'a str) -> &'a str {
        self.aliases
            .get(&term.to_lowercase())
            .map(String::as_str)
            .unwrap_or(term)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for SectorAliases {
    fn default() -> Self {
        Self::builtin()
    }
}
