//! Priority-ordered fallback across acquisition channels. Each source kind
//! maps to a fixed provider chain resolved at configuration-load time; the
//! chain stops at the first provider that returns non-empty data and
//! treats provider errors exactly like absence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::aggregator::AggregatorProvider;
use super::browser::BrowserProvider;
use super::direct::DirectSiteProvider;
use super::index_api::{EtfHoldingsProvider, IndexApiProvider, IndexPageProvider};
use super::mailbox::MailboxProvider;
use super::{FetchOutcome, SourceParams, SourceProvider};
use crate::utils::Credentials;

/// Closed set of acquisition pipelines. An unrecognized string in config
/// fails deserialization up front instead of silently fetching nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Mailbox search, then the AMC's own site.
    MailboxDirectMf,
    /// Mailbox search, then an aggregator portal.
    MailboxAggregatorMf,
    /// Mailbox search, then aggregator, then headless browser.
    MailboxBrowserMf,
    /// Every fund channel in canonical priority order.
    MfFull,
    /// AMC site only.
    DirectMf,
    /// Exchange JSON API, then a constituent-table page.
    IndexApi,
    /// Constituent-table page only.
    IndexPage,
    /// ETF holdings JSON API.
    EtfApi,
}

/// What a fallback chain produced, with the provider that satisfied the
/// request. Provenance is diagnostics only and never feeds change
/// detection.
#[derive(Debug)]
pub struct FetchResult {
    pub outcome: FetchOutcome,
    pub provenance: Option<&'static str>,
}

impl FetchResult {
    fn not_found() -> Self {
        Self {
            outcome: FetchOutcome::NotFound,
            provenance: None,
        }
    }
}

/// Ordered provider list for one entity. Never escalates: exhausting the
/// chain is an empty result, not an error.
pub struct FallbackFetcher {
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl FallbackFetcher {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>) -> Self {
        Self { providers }
    }

    pub async fn fetch(&self, params: &SourceParams) -> FetchResult {
        if self.providers.is_empty() {
            debug!("Empty provider chain, skipping fetch entirely");
            return FetchResult::not_found();
        }
        for provider in &self.providers {
            match provider.attempt(params).await {
                Ok(outcome) if outcome.is_found() => {
                    info!("Provider '{}' satisfied the request", provider.name());
                    return FetchResult {
                        outcome,
                        provenance: Some(provider.name()),
                    };
                }
                Ok(_) => {
                    debug!("Provider '{}' found no data, trying next", provider.name());
                }
                Err(e) => {
                    warn!("Provider '{}' failed ({e}), trying next", provider.name());
                }
            }
        }
        debug!("All providers exhausted");
        FetchResult::not_found()
    }
}

/// Where the orchestrator gets its fallback chains from. The registry
/// below is the production implementation; tests substitute their own.
pub trait FetcherSource: Send + Sync {
    fn fetcher_for(&self, kind: SourceKind) -> FallbackFetcher;
}

/// One instance of each concrete provider, shared across entities. Built
/// once at startup so chains are just priority-ordered views.
pub struct ProviderRegistry {
    mailbox: Arc<MailboxProvider>,
    aggregator: Arc<AggregatorProvider>,
    browser: Arc<BrowserProvider>,
    direct: Arc<DirectSiteProvider>,
    index_api: Arc<IndexApiProvider>,
    index_page: Arc<IndexPageProvider>,
    etf_api: Arc<EtfHoldingsProvider>,
}

impl ProviderRegistry {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            mailbox: Arc::new(MailboxProvider::new(credentials.mailbox_token.clone())),
            aggregator: Arc::new(AggregatorProvider::new()),
            browser: Arc::new(BrowserProvider::new()),
            direct: Arc::new(DirectSiteProvider::new()),
            index_api: Arc::new(IndexApiProvider::new()),
            index_page: Arc::new(IndexPageProvider::new()),
            etf_api: Arc::new(EtfHoldingsProvider::new()),
        }
    }
}

impl FetcherSource for ProviderRegistry {
    /// Fixed chain for a source kind, in priority order:
    /// mailbox -> aggregator -> browser -> direct site for funds,
    /// API -> page for indexes.
    fn fetcher_for(&self, kind: SourceKind) -> FallbackFetcher {
        let chain: Vec<Arc<dyn SourceProvider>> = match kind {
            SourceKind::MailboxDirectMf => {
                vec![self.mailbox.clone(), self.direct.clone()]
            }
            SourceKind::MailboxAggregatorMf => {
                vec![self.mailbox.clone(), self.aggregator.clone()]
            }
            SourceKind::MailboxBrowserMf => vec![
                self.mailbox.clone(),
                self.aggregator.clone(),
                self.browser.clone(),
            ],
            SourceKind::MfFull => vec![
                self.mailbox.clone(),
                self.aggregator.clone(),
                self.browser.clone(),
                self.direct.clone(),
            ],
            SourceKind::DirectMf => vec![self.direct.clone()],
            SourceKind::IndexApi => vec![self.index_api.clone(), self.index_page.clone()],
            SourceKind::IndexPage => vec![self.index_page.clone()],
            SourceKind::EtfApi => vec![self.etf_api.clone()],
        };
        FallbackFetcher::new(chain)
    }
}
