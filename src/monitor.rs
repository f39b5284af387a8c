//! The acquisition orchestrator: drives one full run across every
//! configured entity, sequentially and rate-limited, assembles the current
//! snapshot, and diffs it against the previous one. One bad source never
//! aborts the run.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::detector::{detect_fund_changes, detect_index_changes, FundChangeSet};
use crate::report::{ChangeReport, FundReport};
use crate::snapshot::{normalize_holdings, FundSnapshot, IndexSnapshot, StateSnapshot};
use crate::sources::{FetchOutcome, FetcherSource, ProviderRegistry};
use crate::utils::{Config, EntityConfig};

pub struct PortfolioMonitor {
    config: Config,
    fetchers: Box<dyn FetcherSource>,
    fetch_delay: Duration,
}

impl PortfolioMonitor {
    pub fn new(config: Config) -> Self {
        let fetchers = Box::new(ProviderRegistry::new(&config.credentials));
        let fetch_delay = Duration::from_secs(config.thresholds.fetch_delay_secs);
        Self {
            config,
            fetchers,
            fetch_delay,
        }
    }

    /// Custom fetcher source and delay, used by tests to substitute mock
    /// providers and run without pacing.
    pub fn with_fetchers(
        config: Config,
        fetchers: Box<dyn FetcherSource>,
        fetch_delay: Duration,
    ) -> Self {
        Self {
            config,
            fetchers,
            fetch_delay,
        }
    }

    /// One full run: fetch everything, diff against `previous`, return the
    /// new snapshot and the report. The caller persists the snapshot; the
    /// run itself never writes state, so an interrupted run leaves the
    /// previous snapshot untouched.
    pub async fn run(&self, previous: &StateSnapshot) -> (StateSnapshot, ChangeReport) {
        let run_date = Utc::now().date_naive();
        let run_month = run_date.format("%Y-%m").to_string();
        info!("Portfolio monitor run for {run_month}");

        let mut current = StateSnapshot::default();
        for entity in &self.config.indexes {
            if !entity.enabled {
                info!("Skipping disabled index: {}", entity.name);
                continue;
            }
            let members = self.fetch_index(entity).await;
            current.indexes.insert(entity.name.clone(), members);
            self.pace().await;
        }
        for entity in &self.config.mutual_funds {
            if !entity.enabled {
                info!("Skipping disabled fund: {}", entity.name);
                continue;
            }
            let snapshot = self.fetch_fund(entity, run_date).await;
            current.mutual_funds.insert(entity.name.clone(), snapshot);
            self.pace().await;
        }

        let report = self.build_report(previous, &current, run_month);
        (current, report)
    }

    async fn fetch_index(&self, entity: &EntityConfig) -> IndexSnapshot {
        info!("Fetching constituents for {}...", entity.name);
        let result = self
            .fetchers
            .fetcher_for(entity.source)
            .fetch(&entity.params)
            .await;
        match result.outcome {
            FetchOutcome::Constituents(members) => {
                info!(
                    "  {}: found {} constituents (via {})",
                    entity.name,
                    members.len(),
                    result.provenance.unwrap_or("none")
                );
                members.into_iter().collect()
            }
            FetchOutcome::Holdings(_) => {
                warn!(
                    "  {}: source returned fund holdings for an index entity, recording none",
                    entity.name
                );
                Vec::new()
            }
            FetchOutcome::NotFound => {
                warn!("  {}: no constituents found", entity.name);
                Vec::new()
            }
        }
    }

    async fn fetch_fund(&self, entity: &EntityConfig, run_date: NaiveDate) -> FundSnapshot {
        info!("Fetching holdings for {}...", entity.name);
        let result = self
            .fetchers
            .fetcher_for(entity.source)
            .fetch(&entity.params)
            .await;

        let (raw, disclosure_date) = match result.outcome {
            FetchOutcome::Holdings(fetched) => (fetched.holdings, fetched.disclosure_date),
            FetchOutcome::Constituents(_) => {
                warn!(
                    "  {}: source returned index membership for a fund entity, recording none",
                    entity.name
                );
                (Vec::new(), None)
            }
            FetchOutcome::NotFound => (Vec::new(), None),
        };

        let holdings = normalize_holdings(raw, self.config.thresholds.min_holding_to_report);
        if holdings.is_empty() {
            warn!("  {}: 0 holdings found", entity.name);
        } else {
            info!(
                "  {}: found {} holdings (via {})",
                entity.name,
                holdings.len(),
                result.provenance.unwrap_or("none")
            );
        }

        // The provider's own disclosure date wins over the run clock.
        let effective_date = disclosure_date.unwrap_or(run_date);
        FundSnapshot {
            month: effective_date.format("%Y-%m").to_string(),
            disclosure_date: effective_date.format("%Y-%m-%d").to_string(),
            holdings,
        }
    }

    fn build_report(
        &self,
        previous: &StateSnapshot,
        current: &StateSnapshot,
        run_month: String,
    ) -> ChangeReport {
        let index_changes = detect_index_changes(&previous.indexes, &current.indexes);

        let threshold = self.config.thresholds.mf_percentage_change;
        let empty = Default::default();
        let mut fund_changes = std::collections::BTreeMap::new();
        for (name, fund) in &current.mutual_funds {
            let prev_fund = previous.mutual_funds.get(name);
            let changes = if prev_fund.is_none() && !self.config.thresholds.report_first_run_baseline
            {
                // Baseline run for this fund, deliberately silent.
                FundChangeSet::default()
            } else {
                let prev_holdings = prev_fund.map(|f| &f.holdings).unwrap_or(&empty);
                detect_fund_changes(prev_holdings, &fund.holdings, threshold)
            };
            fund_changes.insert(
                name.clone(),
                FundReport {
                    changes,
                    month: fund.month.clone(),
                },
            );
        }

        let report = ChangeReport {
            month: run_month,
            index_changes,
            fund_changes,
            monitored_indexes: self.config.indexes.iter().map(|e| e.name.clone()).collect(),
            monitored_funds: self
                .config
                .mutual_funds
                .iter()
                .map(|e| e.name.clone())
                .collect(),
        };

        if report.has_changes() {
            let fund_count = report
                .fund_changes
                .values()
                .filter(|f| f.changes.has_changes())
                .count();
            info!(
                "Changes detected: {} index(es), {} fund(s)",
                report.index_changes.len(),
                fund_count
            );
        } else {
            info!("No changes detected");
        }
        report
    }

    /// Courtesy pause between entity fetches. A plain cancellable sleep;
    /// rate limiting here is politeness toward scraped endpoints, not a
    /// correctness requirement.
    async fn pace(&self) {
        if !self.fetch_delay.is_zero() {
            sleep(self.fetch_delay).await;
        }
    }
}
