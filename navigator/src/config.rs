use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

pub const MAX_COLUMNS: usize = 8;
pub const MAX_DEBOUNCE_MS: u64 = 2_000;

/// Where fallback-tier matches come from when no entity matches by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Conjunctive word match over the flattened leaves held in memory.
    #[default]
    Local,
    /// Free-text search delegated to the hierarchy source.
    Remote,
    /// Single-tier screens: entity name matches only.
    Disabled,
}

/// Configuration for one search-and-navigate screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Grid width used by the cursor; 1 means linear up/down cycling
    #[serde(default = "default_columns")]
    pub columns: usize,

    /// Quiet period before a query edit triggers a search
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long a fetched hierarchy may be served from cache
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub fallback: FallbackMode,
}

fn default_columns() -> usize {
    1
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_cache_ttl_secs() -> u64 {
    5 * 60
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            debounce_ms: default_debounce_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            fallback: FallbackMode::default(),
        }
    }
}

impl NavigatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.columns == 0 || self.columns > MAX_COLUMNS {
            return Err(format!(
                "columns must be in [1, {MAX_COLUMNS}], got {}",
                self.columns
            ));
        }

        if self.debounce_ms == 0 || self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(format!(
                "debounce_ms must be in [1, {MAX_DEBOUNCE_MS}], got {}",
                self.debounce_ms
            ));
        }

        if self.cache_ttl_secs == 0 {
            return Err("cache_ttl_secs must be > 0".to_string());
        }

        Ok(())
    }

    /// Reads a TOML file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NavigatorConfig = toml::from_str(&content)?;
        config
            .validate()
            .map_err(crate::error::NavError::InvalidConfig)?;
        Ok(config)
    }

    /// Single-column list with up/down cycling
    pub fn linear() -> Self {
        Self::default()
    }

    /// Card grid with `columns` cells per row
    pub fn grid(columns: usize) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
