//! Headless-browser fallback for disclosure pages that render their
//! download links with JavaScript. A browser is launched per attempt and
//! torn down on every path, success or failure.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, info};

use super::aggregator::pick_monthly_link;
use super::html::{document_links, pick_link};
use super::sheet::parse_holdings_csv;
use super::{optional_param, required_param, FetchOutcome, FetchedHoldings, SourceParams, SourceProvider};
use crate::constants::{BROWSER_NAV_TIMEOUT_SECS, DOWNLOAD_TIMEOUT_SECS};
use crate::errors::{MonitorError, Result};

const SHEET_EXTS: &[&str] = &[".csv", ".xls", ".xlsx"];

pub struct BrowserProvider {
    client: Client,
}

impl BrowserProvider {
    pub fn new() -> Self {
        Self {
            client: super::http_client(),
        }
    }

    async fn rendered_html(&self, url: &str) -> Result<String> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(MonitorError::browser)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| MonitorError::browser(format!("launch: {e}")))?;
        let events = tokio::task::spawn(async move { while handler.next().await.is_some() {} });

        let result = timeout(
            Duration::from_secs(BROWSER_NAV_TIMEOUT_SECS),
            self.navigate(&browser, url),
        )
        .await
        .unwrap_or_else(|_| Err(MonitorError::browser(format!("navigation to {url} timed out"))));

        // Teardown happens regardless of how navigation went.
        browser.close().await.ok();
        events.abort();
        result
    }

    async fn navigate(&self, browser: &Browser, url: &str) -> Result<String> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| MonitorError::browser(format!("open {url}: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| MonitorError::browser(format!("navigate {url}: {e}")))?;
        page.content()
            .await
            .map_err(|e| MonitorError::browser(format!("content of {url}: {e}")))
    }
}

impl Default for BrowserProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceProvider for BrowserProvider {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let page_url = required_param(params, "page_url")?;

        debug!("Rendering {page_url} in headless browser");
        let html = self.rendered_html(page_url).await?;
        let links = document_links(&html, Some(page_url), SHEET_EXTS);
        if links.is_empty() {
            info!("Rendered page has no disclosure files: {page_url}");
            return Ok(FetchOutcome::NotFound);
        }

        let scheme_match = optional_param(params, "scheme_name")
            .and_then(|scheme| pick_link(&links, &[scheme.to_string()]));
        let (link, disclosure_date) = match scheme_match {
            Some(link) => (link, None),
            None => match pick_monthly_link(&links) {
                Some((link, month)) => (link, Some(month)),
                None => return Ok(FetchOutcome::NotFound),
            },
        };

        info!("Downloading disclosure file: {}", link.href);
        let response = self
            .client
            .get(&link.href)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "disclosure download returned {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        let holdings = parse_holdings_csv(&bytes)?;
        if holdings.is_empty() {
            return Ok(FetchOutcome::NotFound);
        }
        Ok(FetchOutcome::Holdings(FetchedHoldings {
            holdings,
            disclosure_date,
        }))
    }
}
