//! Run configuration
//!
//! Loaded from a JSON file. Endpoint templates may carry `{market}` and
//! `{classification}` placeholders, substituted per market so one config
//! drives every market in the table. The catalog endpoint is the only
//! required source; categories, guide and stream resolution are optional
//! and their absence simply leaves the corresponding fields at their
//! sentinels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GenError, Result};

/// One market to generate artifacts for: an explicit value threaded through
/// every fetch and normalize call, never process-global state
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    /// Market/locale code, e.g. "it"
    pub code: String,
    /// Upstream classification id for this market
    pub classification_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Primary catalog endpoint - a failure here is fatal to the market run
    pub catalog_url: String,
    /// Standalone category listing; optional
    #[serde(default)]
    pub categories_url: Option<String>,
    /// XMLTV guide feed, possibly gzip-compressed; optional
    #[serde(default)]
    pub guide_url: Option<String>,
    /// Per-channel stream resolution endpoint; optional
    #[serde(default)]
    pub streams_url: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    /// market code -> classification id; iterated in sorted code order so
    /// the aggregation order is deterministic and documented
    pub markets: BTreeMap<String, i64>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Public base URL the playlist's guide pointer is resolved against;
    /// without it the pointer is the guide's file name
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_guide_horizon")]
    pub guide_horizon_hours: i64,
    #[serde(default = "default_record_horizon")]
    pub record_horizon_hours: i64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:98.0) Gecko/20100101 Firefox/98.0".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    30
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}
fn default_file_prefix() -> String {
    "catalog".to_string()
}
fn default_guide_horizon() -> i64 {
    24
}
fn default_record_horizon() -> i64 {
    12
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| GenError::Config(format!("read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| GenError::Config(format!("parse {}: {e}", path.display())))?;
        if config.markets.is_empty() {
            return Err(GenError::Config("no markets configured".to_string()));
        }
        Ok(config)
    }

    /// Markets in sorted code order - the aggregation input order
    pub fn markets(&self) -> Vec<Market> {
        self.markets
            .iter()
            .map(|(code, &classification_id)| Market {
                code: code.clone(),
                classification_id,
            })
            .collect()
    }

    /// Location embedded in the playlist header for a guide artifact name
    pub fn guide_location(&self, file_name: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), file_name),
            None => file_name.to_string(),
        }
    }
}

/// Substitute the per-market placeholders into an endpoint template
pub fn expand_template(template: &str, market: &Market) -> String {
    template
        .replace("{market}", &market.code)
        .replace("{classification}", &market.classification_id.to_string())
}
