//! Direct fund-house site scraping: the AMC's own portfolio-disclosure
//! page, last in every chain because it is the most layout-fragile.

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use super::html::{document_links, pick_link};
use super::sheet::parse_holdings_csv;
use super::{optional_param, required_param, FetchOutcome, FetchedHoldings, SourceParams, SourceProvider};
use crate::constants::DOWNLOAD_TIMEOUT_SECS;
use crate::errors::{MonitorError, Result};

const SHEET_EXTS: &[&str] = &[".csv", ".xls", ".xlsx"];

pub struct DirectSiteProvider {
    client: Client,
}

impl DirectSiteProvider {
    pub fn new() -> Self {
        Self {
            client: super::http_client(),
        }
    }
}

impl Default for DirectSiteProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceProvider for DirectSiteProvider {
    fn name(&self) -> &'static str {
        "direct_site"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let portfolio_url = required_param(params, "portfolio_url")?;

        let response = self.client.get(portfolio_url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "disclosure page returned {}",
                response.status()
            )));
        }
        let html = response.text().await?;
        let links = document_links(&html, Some(portfolio_url), SHEET_EXTS);

        let mut needles = Vec::new();
        if let Some(scheme) = optional_param(params, "scheme_name") {
            needles.push(scheme.to_string());
        }
        if let Some(code) = optional_param(params, "fund_code") {
            needles.push(code.to_string());
        }

        let link = if needles.is_empty() {
            links.first().cloned()
        } else {
            pick_link(&links, &needles)
        };
        let Some(link) = link else {
            info!("No disclosure file matching scheme on {portfolio_url}");
            return Ok(FetchOutcome::NotFound);
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
            disclosure_date: None,
        }))
    }
}
