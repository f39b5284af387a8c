use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portfolio_monitor::notify::{LogNotifier, Notifier};
use portfolio_monitor::resolve::TickerResolver;
use portfolio_monitor::{Config, PortfolioMonitor, StateStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portfolio_monitor=info")),
        )
        .init();

    let data_dir = PathBuf::from(
        std::env::var("MONITOR_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
    );
    std::fs::create_dir_all(&data_dir)?;

    let config = Config::load(&data_dir.join("config.json"))?;
    let store = StateStore::new(data_dir.join("previous_state.json"));
    let previous = store.load()?;

    let resolver = TickerResolver::new(config.credentials.llm_api_key.clone());
    let monitor = PortfolioMonitor::new(config);

    let (current, report) = monitor.run(&previous).await;

    // Persist before notifying: a lost state write would re-report the
    // same changes next run, so failure here aborts loudly.
    store.save(&current)?;

    let mut company_names = HashMap::new();
    if resolver.is_available() {
        for (index_name, changes) in &report.index_changes {
            let mut tickers = changes.added.clone();
            tickers.extend(changes.removed.iter().cloned());
            company_names.extend(resolver.resolve_tickers(&tickers, index_name).await);
        }
    }

    let body = report.render_with_names(&company_names);
    LogNotifier.notify(&report.subject(), &body).await?;

    info!("Run complete");
    Ok(())
}
