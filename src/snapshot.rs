use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{MonitorError, Result};

/// Normalized fund holdings: stock symbol -> percentage of net assets.
pub type Holdings = BTreeMap<String, f64>;

/// Index membership, kept sorted so two fetches of the same constituents
/// always compare equal regardless of source ordering.
pub type IndexSnapshot = Vec<String>;

/// One fund's disclosure for a single period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSnapshot {
    /// Disclosure period, "YYYY-MM". Display only, never a diff key.
    pub month: String,
    /// "YYYY-MM-DD"; the provider's disclosure date when it supplied one,
    /// otherwise the run date.
    pub disclosure_date: String,
    pub holdings: Holdings,
}

/// Full point-in-time record of every monitored entity. The only artifact
/// persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexSnapshot>,
    #[serde(default)]
    pub mutual_funds: BTreeMap<String, FundSnapshot>,
}

/// Upper-case and trim a raw symbol, stripping the non-breaking spaces that
/// scraped pages and spreadsheet cells tend to carry.
pub fn normalize_symbol(raw: &str) -> String {
    raw.replace(['\u{a0}', '\u{2007}', '\u{202f}'], " ")
        .trim()
        .to_uppercase()
}

/// Round a percentage to one decimal, the precision disclosures are
/// compared at.
pub fn round_pct(pct: f64) -> f64 {
    (pct * 10.0).round() / 10.0
}

/// Normalize raw fetched holdings: clean symbols, drop positions below
/// `min_holding`, round to one decimal. Later duplicates of a symbol win,
/// matching how disclosure sheets repeat a scrip across sections.
pub fn normalize_holdings(
    raw: impl IntoIterator<Item = (String, f64)>,
    min_holding: f64,
) -> Holdings {
    let mut out = Holdings::new();
    for (symbol, pct) in raw {
        let symbol = normalize_symbol(&symbol);
        if symbol.is_empty() || !pct.is_finite() {
            continue;
        }
        if pct < min_holding {
            continue;
        }
        out.insert(symbol, round_pct(pct));
    }
    out
}

/// Loads and persists the previous-state file. The save path is atomic:
/// a failed run or a failed write never corrupts the prior snapshot.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Missing file means first run: empty snapshot, not an error.
    pub fn load(&self) -> Result<StateSnapshot> {
        if !self.path.exists() {
            debug!("No previous state at {:?}, starting from empty", self.path);
            return Ok(StateSnapshot::default());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| MonitorError::state(format!("reading {:?}: {e}", self.path)))?;
        serde_json::from_str(&raw)
            .map_err(|e| MonitorError::state(format!("decoding {:?}: {e}", self.path)))
    }

    /// Write the new snapshot to a temp file in the same directory, then
    /// rename over the old one. Any failure here is fatal for the run: a
    /// lost write would re-report the same changes next month.
    pub fn save(&self, state: &StateSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| MonitorError::state(format!("encoding state: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| MonitorError::state(format!("writing {tmp:?}: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| MonitorError::state(format!("renaming {tmp:?} into place: {e}")))?;
        info!("State saved to {:?}", self.path);
        Ok(())
    }
}
