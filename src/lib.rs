//! Portfolio holdings monitor: fetches index constituents and mutual-fund
//! disclosures from multiple unreliable sources with per-entity fallback
//! chains, diffs them against the previous snapshot, and assembles a
//! change report.

pub mod constants;
pub mod detector;
pub mod errors;
pub mod monitor;
pub mod notify;
pub mod report;
pub mod resolve;
pub mod snapshot;
pub mod sources;
pub mod utils;

pub use detector::{detect_fund_changes, detect_index_changes, FundChangeSet, IndexChanges};
pub use errors::{MonitorError, Result};
pub use monitor::PortfolioMonitor;
pub use report::ChangeReport;
pub use snapshot::{StateSnapshot, StateStore};
pub use utils::Config;
