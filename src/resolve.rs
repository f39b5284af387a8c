//! Optional ticker-to-company-name resolution for index reports, backed by
//! an LLM chat-completions API. Strictly cosmetic: any failure degrades to
//! bare tickers, never to a failed report.

use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{GROQ_API_URL, GROQ_MODEL};
use crate::errors::{MonitorError, Result};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

pub struct TickerResolver {
    api_key: Option<String>,
    client: Client,
    api_url: String,
}

impl TickerResolver {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: Client::new(),
            api_url: GROQ_API_URL.to_string(),
        }
    }

    pub fn with_api_url(api_key: Option<String>, api_url: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            api_url,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve tickers to company names. Returns an empty map when the
    /// resolver is unconfigured or the API misbehaves.
    pub async fn resolve_tickers(
        &self,
        tickers: &[String],
        index_name: &str,
    ) -> HashMap<String, String> {
        if tickers.is_empty() || !self.is_available() {
            return HashMap::new();
        }
        match self.query(tickers, index_name).await {
            Ok(map) => map,
            Err(e) => {
                warn!("Ticker resolution failed, reporting bare tickers: {e}");
                HashMap::new()
            }
        }
    }

    async fn query(&self, tickers: &[String], index_name: &str) -> Result<HashMap<String, String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MonitorError::config("resolver called without API key"))?;

        let request = ChatRequest {
            model: GROQ_MODEL.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "You identify listed companies from stock tickers. \
                              Reply with one line per ticker, formatted exactly as \
                              TICKER: Company Name. No commentary."
                        .to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: format!(
                        "These tickers are constituents of {index_name}:\n{}",
                        tickers.join("\n")
                    ),
                },
            ],
            temperature: 0.0,
            max_tokens: 500,
            stream: false,
        };

        debug!("Resolving {} tickers for {index_name}", tickers.len());
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MonitorError::external_api(format!(
                "resolver API returned {}",
                response.status()
            )));
        }
        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| MonitorError::external_api("resolver returned no choices"))?;

        Ok(parse_name_lines(content, tickers))
    }
}

/// Parse "TICKER: Company Name" lines, keeping only tickers we asked about.
fn parse_name_lines(content: &str, tickers: &[String]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for line in content.lines() {
        let Some((ticker, name)) = line.split_once(':') else {
            continue;
        };
        let ticker = ticker.trim().to_uppercase();
        let name = name.trim();
        if !name.is_empty() && tickers.iter().any(|t| t.eq_ignore_ascii_case(&ticker)) {
            names.insert(ticker, name.to_string());
        }
    }
    names
}
