use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_CHANGE_THRESHOLD, DEFAULT_FETCH_DELAY_SECS, DEFAULT_MIN_HOLDING};
use crate::errors::{MonitorError, Result};
use crate::sources::{SourceKind, SourceParams};

/// One monitored index or mutual fund. `name` is the identity used to join
/// against the previous snapshot, so it must be unique and stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    pub source: SourceKind,
    #[serde(default)]
    pub params: SourceParams,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum percentage-point move to report a rebalance.
    pub mf_percentage_change: f64,
    /// Holdings below this percentage are dropped at normalization time.
    pub min_holding_to_report: f64,
    /// Courtesy delay between entity fetches.
    pub fetch_delay_secs: u64,
    /// When false, a fund with no prior snapshot produces an empty change
    /// set instead of reporting every holding as an addition.
    pub report_first_run_baseline: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mf_percentage_change: DEFAULT_CHANGE_THRESHOLD,
            min_holding_to_report: DEFAULT_MIN_HOLDING,
            fetch_delay_secs: DEFAULT_FETCH_DELAY_SECS,
            report_first_run_baseline: true,
        }
    }
}

/// Secrets come from the environment, never from the config file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// OAuth access token for the read-only mailbox search.
    pub mailbox_token: Option<String>,
    /// API key for the optional ticker-to-company-name resolver.
    pub llm_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexes: Vec<EntityConfig>,
    #[serde(default)]
    pub mutual_funds: Vec<EntityConfig>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Config {
    /// Load the config file, overlay credentials from the environment, and
    /// validate. A missing file yields an empty (but valid) config; an
    /// unreadable or malformed file is an error. Unknown `source` strings
    /// fail deserialization here, before any network call is made.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|e| MonitorError::config(format!("reading {path:?}: {e}")))?;
            serde_json::from_str::<Config>(&raw)
                .map_err(|e| MonitorError::config(format!("parsing {path:?}: {e}")))?
        } else {
            warn!("Config file {:?} not found, monitoring nothing", path);
            Config::default()
        };
        config.credentials = Credentials::from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entity in self.indexes.iter().chain(self.mutual_funds.iter()) {
            if entity.name.trim().is_empty() {
                return Err(MonitorError::config("entity with empty name"));
            }
            if !seen.insert(entity.name.as_str()) {
                return Err(MonitorError::config(format!(
                    "duplicate entity name '{}'",
                    entity.name
                )));
            }
        }
        if self.thresholds.mf_percentage_change < 0.0 {
            return Err(MonitorError::config("mf_percentage_change must be >= 0"));
        }
        if self.thresholds.min_holding_to_report < 0.0 {
            return Err(MonitorError::config("min_holding_to_report must be >= 0"));
        }
        Ok(())
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            mailbox_token: env::var("MAILBOX_ACCESS_TOKEN").ok().map(clean_credential),
            llm_api_key: env::var("GROQ_API_KEY").ok().map(clean_credential),
        }
    }
}

/// Strip all whitespace (including non-breaking spaces) and non-ASCII bytes
/// from a credential. Tokens pasted from mail clients routinely pick these
/// up and then fail authentication.
fn clean_credential(value: String) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && c.is_ascii())
        .collect()
}
