//! Acquisition channels. Each provider implements the same narrow
//! contract: try to fetch, report data or absence, never treat absence as
//! an error. All network side effects live in this layer.

pub mod aggregator;
pub mod browser;
pub mod direct;
pub mod fallback;
pub mod html;
pub mod index_api;
pub mod mailbox;
pub mod sheet;

pub use fallback::{FallbackFetcher, FetchResult, FetcherSource, ProviderRegistry, SourceKind};

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::constants::{HTTP_TIMEOUT_SECS, USER_AGENT};
use crate::errors::{MonitorError, Result};

/// Opaque per-entity parameter bag from config, passed through to providers.
pub type SourceParams = HashMap<String, String>;

/// Raw fund holdings as fetched, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedHoldings {
    pub holdings: Vec<(String, f64)>,
    /// Set when the source discloses its own publication date.
    pub disclosure_date: Option<NaiveDate>,
}

impl FetchedHoldings {
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

/// What one attempt produced. Absence is a first-class result so the
/// fallback chain is driven by data, not by exception interception.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Holdings(FetchedHoldings),
    Constituents(BTreeSet<String>),
    NotFound,
}

impl FetchOutcome {
    pub fn is_found(&self) -> bool {
        match self {
            FetchOutcome::Holdings(h) => !h.is_empty(),
            FetchOutcome::Constituents(c) => !c.is_empty(),
            FetchOutcome::NotFound => false,
        }
    }
}

/// One concrete acquisition channel. `attempt` returns `Err` only for hard
/// failures (network, malformed response); "no data there" is
/// `Ok(NotFound)`. Providers must be read-only toward any external account.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable name recorded as provenance in diagnostics.
    fn name(&self) -> &'static str;

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome>;
}

/// Required string parameter, surfaced as a config error when missing.
pub fn required_param<'a>(params: &'a SourceParams, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MonitorError::config(format!("missing required param '{key}'")))
}

pub fn optional_param<'a>(params: &'a SourceParams, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Shared HTTP client: browser-like user agent and a bounded per-request
/// timeout so a stalled upstream advances the fallback chain instead of
/// hanging the run.
pub fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}
