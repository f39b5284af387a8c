use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use portfolio_monitor::errors::{MonitorError, Result};
use portfolio_monitor::snapshot::StateSnapshot;
use portfolio_monitor::sources::{
    FallbackFetcher, FetchOutcome, FetchedHoldings, FetcherSource, SourceKind, SourceParams,
    SourceProvider,
};
use portfolio_monitor::utils::{Config, EntityConfig, Thresholds};
use portfolio_monitor::PortfolioMonitor;

/// A provider with a scripted result and a call counter.
struct ScriptedProvider {
    label: &'static str,
    calls: Arc<AtomicUsize>,
    result: Script,
}

enum Script {
    Fail,
    NotFound,
    Holdings(Vec<(String, f64)>),
    Constituents(Vec<&'static str>),
}

impl ScriptedProvider {
    fn new(label: &'static str, result: Script) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(Self {
            label,
            calls: calls.clone(),
            result,
        });
        (provider, calls)
    }
}

#[async_trait]
impl SourceProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.label
    }

    async fn attempt(&self, _params: &SourceParams) -> Result<FetchOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Script::Fail => Err(MonitorError::external_api("scripted failure")),
            Script::NotFound => Ok(FetchOutcome::NotFound),
            Script::Holdings(h) => Ok(FetchOutcome::Holdings(FetchedHoldings {
                holdings: h.clone(),
                disclosure_date: None,
            })),
            Script::Constituents(symbols) => Ok(FetchOutcome::Constituents(
                symbols.iter().map(|s| s.to_string()).collect(),
            )),
        }
    }
}

#[tokio::test]
async fn fallback_short_circuits_on_first_success() {
    let (a, a_calls) = ScriptedProvider::new("a", Script::Fail);
    let (b, b_calls) =
        ScriptedProvider::new("b", Script::Holdings(vec![("X".to_string(), 5.0)]));
    let (c, c_calls) = ScriptedProvider::new("c", Script::NotFound);

    let fetcher = FallbackFetcher::new(vec![a, b, c]);
    let result = fetcher.fetch(&SourceParams::new()).await;

    assert_eq!(result.provenance, Some("b"));
    match result.outcome {
        FetchOutcome::Holdings(h) => assert_eq!(h.holdings, vec![("X".to_string(), 5.0)]),
        other => panic!("expected holdings, got {other:?}"),
    }
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0, "c must never be invoked");
}

#[tokio::test]
async fn provider_error_is_treated_like_absence() {
    let (a, _) = ScriptedProvider::new("a", Script::Fail);
    let (b, b_calls) = ScriptedProvider::new("b", Script::Fail);

    let fetcher = FallbackFetcher::new(vec![a, b]);
    let result = fetcher.fetch(&SourceParams::new()).await;

    assert_eq!(result.outcome, FetchOutcome::NotFound);
    assert_eq!(result.provenance, None);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1, "chain advanced past the error");
}

#[tokio::test]
async fn empty_holdings_do_not_count_as_success() {
    let (a, _) = ScriptedProvider::new("a", Script::Holdings(Vec::new()));
    let (b, _) = ScriptedProvider::new("b", Script::Holdings(vec![("Y".to_string(), 2.0)]));

    let fetcher = FallbackFetcher::new(vec![a, b]);
    let result = fetcher.fetch(&SourceParams::new()).await;

    assert_eq!(result.provenance, Some("b"));
}

#[tokio::test]
async fn empty_chain_yields_not_found_without_any_attempt() {
    let fetcher = FallbackFetcher::new(Vec::new());
    let result = fetcher.fetch(&SourceParams::new()).await;
    assert_eq!(result.outcome, FetchOutcome::NotFound);
    assert_eq!(result.provenance, None);
}

/// Fetcher source that hands every fund entity a failing chain except one.
struct ScriptedFetchers {
    fund_chain_by_call: std::sync::Mutex<Vec<Vec<Arc<dyn SourceProvider>>>>,
}

impl FetcherSource for ScriptedFetchers {
    fn fetcher_for(&self, _kind: SourceKind) -> FallbackFetcher {
        let mut chains = self.fund_chain_by_call.lock().unwrap();
        FallbackFetcher::new(if chains.is_empty() {
            Vec::new()
        } else {
            chains.remove(0)
        })
    }
}

fn test_config(funds: &[&str]) -> Config {
    Config {
        indexes: Vec::new(),
        mutual_funds: funds
            .iter()
            .map(|name| EntityConfig {
                name: name.to_string(),
                source: SourceKind::MfFull,
                params: SourceParams::new(),
                enabled: true,
            })
            .collect(),
        thresholds: Thresholds {
            fetch_delay_secs: 0,
            ..Thresholds::default()
        },
        credentials: Default::default(),
    }
}

#[tokio::test]
async fn total_failure_of_one_entity_does_not_abort_the_run() {
    let (broken, _) = ScriptedProvider::new("broken", Script::Fail);
    let (working, _) =
        ScriptedProvider::new("working", Script::Holdings(vec![("RELIANCE".to_string(), 6.5)]));

    let fetchers = ScriptedFetchers {
        fund_chain_by_call: std::sync::Mutex::new(vec![
            vec![broken as Arc<dyn SourceProvider>],
            vec![working as Arc<dyn SourceProvider>],
        ]),
    };

    let monitor = PortfolioMonitor::with_fetchers(
        test_config(&["Broken Fund", "Working Fund"]),
        Box::new(fetchers),
        Duration::ZERO,
    );
    let (current, report) = monitor.run(&StateSnapshot::default()).await;

    // Both entities are present; the broken one is empty, not missing.
    assert_eq!(current.mutual_funds.len(), 2);
    assert!(current.mutual_funds["Broken Fund"].holdings.is_empty());
    assert_eq!(
        current.mutual_funds["Working Fund"].holdings["RELIANCE"],
        6.5
    );
    // The report still generates and covers both funds.
    assert!(report.fund_changes.contains_key("Broken Fund"));
    assert!(report.fund_changes.contains_key("Working Fund"));
}

#[tokio::test]
async fn disabled_fund_is_skipped_entirely() {
    let mut config = test_config(&["Disabled Fund"]);
    config.mutual_funds[0].enabled = false;

    let fetchers = ScriptedFetchers {
        fund_chain_by_call: std::sync::Mutex::new(Vec::new()),
    };
    let monitor = PortfolioMonitor::with_fetchers(config, Box::new(fetchers), Duration::ZERO);
    let (current, _) = monitor.run(&StateSnapshot::default()).await;

    assert!(current.mutual_funds.is_empty());
}

#[tokio::test]
async fn fund_symbols_are_normalized_and_filtered_by_minimum() {
    let (provider, _) = ScriptedProvider::new(
        "raw",
        Script::Holdings(vec![
            (" reliance \u{a0}".to_string(), 6.52),
            ("tcs".to_string(), 5.24),
            ("dust".to_string(), 0.3),
        ]),
    );
    let fetchers = ScriptedFetchers {
        fund_chain_by_call: std::sync::Mutex::new(vec![vec![provider as Arc<dyn SourceProvider>]]),
    };
    let monitor = PortfolioMonitor::with_fetchers(
        test_config(&["Fund"]),
        Box::new(fetchers),
        Duration::ZERO,
    );

    let (current, _) = monitor.run(&StateSnapshot::default()).await;
    let holdings = &current.mutual_funds["Fund"].holdings;
    assert_eq!(holdings.get("RELIANCE"), Some(&6.5));
    assert_eq!(holdings.get("TCS"), Some(&5.2));
    assert_eq!(holdings.len(), 2);
}

#[tokio::test]
async fn index_membership_is_recorded_sorted() {
    let (provider, _) =
        ScriptedProvider::new("idx", Script::Constituents(vec!["ZEE", "ABB", "MRF"]));
    let fetchers = ScriptedFetchers {
        fund_chain_by_call: std::sync::Mutex::new(vec![vec![provider as Arc<dyn SourceProvider>]]),
    };
    let mut config = test_config(&[]);
    config.indexes.push(EntityConfig {
        name: "NIFTY 50".to_string(),
        source: SourceKind::IndexApi,
        params: SourceParams::new(),
        enabled: true,
    });

    let monitor = PortfolioMonitor::with_fetchers(config, Box::new(fetchers), Duration::ZERO);
    let (current, _) = monitor.run(&StateSnapshot::default()).await;

    assert_eq!(current.indexes["NIFTY 50"], vec!["ABB", "MRF", "ZEE"]);
}

#[tokio::test]
async fn first_run_baseline_can_be_suppressed() {
    let (provider, _) = ScriptedProvider::new(
        "p",
        Script::Holdings(vec![("RELIANCE".to_string(), 6.5)]),
    );
    let fetchers = ScriptedFetchers {
        fund_chain_by_call: std::sync::Mutex::new(vec![vec![provider as Arc<dyn SourceProvider>]]),
    };
    let mut config = test_config(&["Fund"]);
    config.thresholds.report_first_run_baseline = false;

    let monitor = PortfolioMonitor::with_fetchers(config, Box::new(fetchers), Duration::ZERO);
    let (current, report) = monitor.run(&StateSnapshot::default()).await;

    // State still captures the baseline; only the report is silent.
    assert_eq!(current.mutual_funds["Fund"].holdings["RELIANCE"], 6.5);
    assert!(!report.fund_changes["Fund"].changes.has_changes());
}
