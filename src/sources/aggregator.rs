//! Third-party aggregator scraping. Aggregator portals list each AMC's
//! monthly disclosure files; we want the newest month that is actually
//! present, falling back a few months when the current one is late.

use std::time::Duration;

use chrono::{Datelike, Months, NaiveDate, Utc};
use reqwest::Client;
use tracing::{info, warn};

use super::html::{document_links, pick_link, DocumentLink};
use super::sheet::parse_holdings_csv;
use super::{optional_param, required_param, FetchOutcome, FetchedHoldings, SourceParams, SourceProvider};
use crate::constants::{DISCLOSURE_MONTHS_BACK, DOWNLOAD_TIMEOUT_SECS};
use crate::errors::{MonitorError, Result};

const SHEET_EXTS: &[&str] = &[".csv", ".xls", ".xlsx"];

/// Disclosure months to try, newest first.
pub(crate) fn recent_months() -> Vec<NaiveDate> {
    let today = Utc::now().date_naive().with_day(1).unwrap_or_else(|| Utc::now().date_naive());
    (0..=DISCLOSURE_MONTHS_BACK)
        .filter_map(|back| today.checked_sub_months(Months::new(back)))
        .collect()
}

/// Text fragments a listing page uses for one disclosure month.
pub(crate) fn month_needles(month: NaiveDate) -> Vec<String> {
    vec![
        month.format("%B %Y").to_string().to_lowercase(),
        month.format("%b %Y").to_string().to_lowercase(),
        month.format("%b-%Y").to_string().to_lowercase(),
        month.format("%Y-%m").to_string(),
    ]
}

/// Newest-month link among the candidates, with the month it matched.
pub(crate) fn pick_monthly_link(links: &[DocumentLink]) -> Option<(DocumentLink, NaiveDate)> {
    for month in recent_months() {
        if let Some(link) = pick_link(links, &month_needles(month)) {
            return Some((link, month));
        }
    }
    None
}

pub struct AggregatorProvider {
    client: Client,
}

impl AggregatorProvider {
    pub fn new() -> Self {
        Self {
            client: super::http_client(),
        }
    }
}

impl Default for AggregatorProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SourceProvider for AggregatorProvider {
    fn name(&self) -> &'static str {
        "aggregator"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let listing_url = required_param(params, "listing_url")?;

        let response = self.client.get(listing_url).send().await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "aggregator listing returned {}",
                response.status()
            )));
        }
        let html = response.text().await?;

        let mut links = document_links(&html, Some(listing_url), SHEET_EXTS);
        if let Some(scheme) = optional_param(params, "scheme_name") {
            let scheme = scheme.to_lowercase();
            links.retain(|l| {
                l.text.to_lowercase().contains(&scheme) || l.href.to_lowercase().contains(&scheme)
            });
        }
        if links.is_empty() {
            info!("No disclosure files listed at {listing_url}");
            return Ok(FetchOutcome::NotFound);
        }

        let (link, disclosure_date) = match pick_monthly_link(&links) {
            Some((link, month)) => (link, Some(month)),
            None => {
                // Listing exists but no recent month is labelled; the top
                // entry is the newest the aggregator has.
                warn!("No file for the last {DISCLOSURE_MONTHS_BACK} months, using newest listed");
                (links[0].clone(), None)
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_months_are_newest_first() {
        let months = recent_months();
        assert_eq!(months.len() as u32, DISCLOSURE_MONTHS_BACK + 1);
        assert!(months.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn month_needles_cover_common_label_styles() {
        let month = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        let needles = month_needles(month);
        assert!(needles.contains(&"november 2025".to_string()));
        assert!(needles.contains(&"nov-2025".to_string()));
        assert!(needles.contains(&"2025-11".to_string()));
    }
}
