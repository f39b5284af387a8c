//! Index constituent providers: exchange JSON API, HTML constituent
//! tables, and ETF holdings APIs. All of these return membership only, no
//! percentages.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{optional_param, required_param, FetchOutcome, SourceParams, SourceProvider};
use crate::constants::{HTTP_TIMEOUT_SECS, USER_AGENT};
use crate::errors::{MonitorError, Result};
use crate::snapshot::normalize_symbol;

const EXCHANGE_API_BASE: &str = "https://www.nseindia.com";

#[derive(Debug, Deserialize)]
struct ExchangeIndexResponse {
    #[serde(default)]
    data: Vec<ExchangeIndexRow>,
}

#[derive(Debug, Deserialize)]
struct ExchangeIndexRow {
    symbol: String,
}

/// Exchange index API. The endpoint refuses cookieless clients, so the
/// site root is fetched first to pick up a session cookie.
pub struct IndexApiProvider {
    client: Client,
    base_url: String,
}

impl IndexApiProvider {
    pub fn new() -> Self {
        Self::with_base_url(EXCHANGE_API_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .cookie_store(true)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

impl Default for IndexApiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceProvider for IndexApiProvider {
    fn name(&self) -> &'static str {
        "index_api"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let index_name = required_param(params, "index_name")?;

        // Cookie warm-up.
        self.client.get(&self.base_url).send().await?;

        let url = format!(
            "{}/api/equity-stockIndices?index={}",
            self.base_url,
            urlencoding::encode(index_name)
        );
        debug!("Fetching index constituents: {url}");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "index API returned {}",
                response.status()
            )));
        }
        let payload: ExchangeIndexResponse = response.json().await?;

        // The first row of the API response is the index itself.
        let constituents: BTreeSet<String> = payload
            .data
            .iter()
            .map(|row| normalize_symbol(&row.symbol))
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(index_name))
            .collect();

        if constituents.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }
        info!("Index API returned {} constituents", constituents.len());
        Ok(FetchOutcome::Constituents(constituents))
    }
}

/// Constituent-table scrape for indexes published as an HTML table
/// (reference pages, official fact sheets).
pub struct IndexPageProvider {
    client: Client,
}

impl IndexPageProvider {
    pub fn new() -> Self {
        Self {
            client: super::http_client(),
        }
    }
}

impl Default for IndexPageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceProvider for IndexPageProvider {
    fn name(&self) -> &'static str {
        "index_page"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let page_url = required_param(params, "page_url")?;
        let table_selector = optional_param(params, "table_selector").unwrap_or("table#constituents");
        let symbol_column: usize = optional_param(params, "symbol_column")
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);

        let response = self.client.get(page_url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "constituent page returned {}",
                response.status()
            )));
        }
        let html = response.text().await?;

        let constituents = parse_constituent_table(&html, table_selector, symbol_column)?;
        if constituents.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }
        info!("Constituent table yielded {} symbols", constituents.len());
        Ok(FetchOutcome::Constituents(constituents))
    }
}

fn parse_constituent_table(
    html: &str,
    table_selector: &str,
    symbol_column: usize,
) -> Result<BTreeSet<String>> {
    let doc = Html::parse_document(html);
    let table = Selector::parse(table_selector)
        .map_err(|e| MonitorError::config(format!("bad table_selector: {e}")))?;
    let row_sel = Selector::parse("tbody tr, tr")
        .map_err(|e| MonitorError::parse(format!("row selector: {e}")))?;
    let cell_sel =
        Selector::parse("td").map_err(|e| MonitorError::parse(format!("cell selector: {e}")))?;

    let mut constituents = BTreeSet::new();
    for table_el in doc.select(&table) {
        for row in table_el.select(&row_sel) {
            let Some(cell) = row.select(&cell_sel).nth(symbol_column) else {
                continue;
            };
            let symbol = normalize_symbol(&cell.text().collect::<String>());
            if !symbol.is_empty() {
                constituents.insert(symbol);
            }
        }
    }
    Ok(constituents)
}

/// ETF holdings API: JSON documents whose holding objects carry a `ticker`
/// or `symbol` field, at whatever nesting depth the issuer chose.
pub struct EtfHoldingsProvider {
    client: Client,
}

impl EtfHoldingsProvider {
    pub fn new() -> Self {
        Self {
            client: super::http_client(),
        }
    }
}

impl Default for EtfHoldingsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceProvider for EtfHoldingsProvider {
    fn name(&self) -> &'static str {
        "etf_api"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let holdings_url = required_param(params, "holdings_url")?;

        let response = self.client.get(holdings_url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "ETF holdings API returned {}",
                response.status()
            )));
        }
        let payload: Value = response.json().await?;

        let mut constituents = BTreeSet::new();
        collect_tickers(&payload, &mut constituents);
        if constituents.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }
        info!("ETF holdings API yielded {} symbols", constituents.len());
        Ok(FetchOutcome::Constituents(constituents))
    }
}

fn collect_tickers(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_tickers(v, out)),
        Value::Object(map) => {
            for key in ["ticker", "symbol"] {
                if let Some(Value::String(s)) = map.get(key) {
                    let symbol = normalize_symbol(s);
                    if !symbol.is_empty() {
                        out.insert(symbol);
                    }
                }
            }
            map.values().for_each(|v| collect_tickers(v, out));
        }
        _ => {}
    }
}
