//! Authenticated mailbox search. AMCs mail monthly portfolio disclosures
//! with a download link; this provider searches for them over the Gmail
//! REST API. Every call is a GET — messages are never marked read,
//! modified, or deleted.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{NaiveDate, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::html::{document_links, pick_link};
use super::sheet::parse_holdings_csv;
use super::{optional_param, required_param, FetchOutcome, FetchedHoldings, SourceParams, SourceProvider};
use crate::constants::{
    DOWNLOAD_TIMEOUT_SECS, GMAIL_API_BASE, MAILBOX_LOOKBACK_DAYS, MAILBOX_MAX_MESSAGES,
};
use crate::errors::{MonitorError, Result};

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    internal_date: Option<String>,
    payload: Option<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    mime_type: Option<String>,
    body: Option<MessageBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    data: Option<String>,
}

pub struct MailboxProvider {
    client: Client,
    access_token: Option<String>,
    base_url: String,
}

impl MailboxProvider {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: super::http_client(),
            access_token,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(access_token: Option<String>, base_url: String) -> Self {
        Self {
            client: super::http_client(),
            access_token,
            base_url,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MonitorError::mailbox(format!(
                "mailbox API returned {} for {url}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Find the newest disclosure email from `amc_name` and return the
    /// download link from its body, plus the message date.
    async fn find_download_link(
        &self,
        token: &str,
        amc_name: &str,
        needles: &[String],
    ) -> Result<Option<(String, NaiveDate)>> {
        let query = format!(
            "from:\"{amc_name}\" subject:portfolio newer_than:{MAILBOX_LOOKBACK_DAYS}d"
        );
        let url = format!(
            "{}/users/me/messages?q={}&maxResults={}",
            self.base_url,
            urlencoding::encode(&query),
            MAILBOX_MAX_MESSAGES
        );
        debug!("Mailbox search: {query}");

        let list: MessageList = self.get_json(&url, token).await?;
        if list.messages.is_empty() {
            info!("No disclosure emails from {amc_name} in the last {MAILBOX_LOOKBACK_DAYS} days");
            return Ok(None);
        }
        info!("Found {} candidate emails from {amc_name}", list.messages.len());

        // The list endpoint returns newest first.
        for msg_ref in &list.messages {
            let url = format!(
                "{}/users/me/messages/{}?format=full",
                self.base_url, msg_ref.id
            );
            let message: Message = match self.get_json(&url, token).await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping unreadable message {}: {e}", msg_ref.id);
                    continue;
                }
            };

            let Some(body) = message.payload.as_ref().and_then(html_body) else {
                continue;
            };
            let links = document_links(&body, None, &[]);
            if let Some(link) = pick_link(&links, needles) {
                let date = message
                    .internal_date
                    .as_deref()
                    .and_then(|ms| ms.parse::<i64>().ok())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(|dt| dt.date_naive())
                    .unwrap_or_else(|| Utc::now().date_naive());
                return Ok(Some((link.href, date)));
            }
        }
        Ok(None)
    }
}

/// Depth-first scan of the MIME tree for the first text/html part.
fn html_body(part: &MessagePart) -> Option<String> {
    if part.mime_type.as_deref() == Some("text/html") {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
            let decoded = URL_SAFE_NO_PAD
                .decode(data.trim_end_matches('='))
                .ok()?;
            return Some(String::from_utf8_lossy(&decoded).into_owned());
        }
    }
    part.parts.iter().find_map(html_body)
}

#[async_trait::async_trait]
impl SourceProvider for MailboxProvider {
    fn name(&self) -> &'static str {
        "mailbox"
    }

    async fn attempt(&self, params: &SourceParams) -> Result<FetchOutcome> {
        let Some(token) = self.access_token.as_deref() else {
            debug!("Mailbox credentials not configured, skipping");
            return Ok(FetchOutcome::NotFound);
        };
        let amc_name = required_param(params, "amc_name")?;

        let mut needles = Vec::new();
        if let Some(fund) = optional_param(params, "fund_name") {
            needles.push(fund.to_string());
        }
        needles.push("portfolio".to_string());
        needles.push("download".to_string());

        let Some((link, date)) = self.find_download_link(token, amc_name, &needles).await? else {
            return Ok(FetchOutcome::NotFound);
        };

        info!("Downloading disclosure from mailbox link");
        let response = self
            .client
            .get(&link)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MonitorError::mailbox(format!(
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
            disclosure_date: Some(date),
        }))
    }
}
