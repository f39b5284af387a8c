//! Notification boundary. The monitor hands a finished report to a
//! `Notifier`; actual delivery transports live behind this trait.

use async_trait::async_trait;
use tracing::info;

use crate::errors::Result;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Writes the report to the log and stdout. The default sink for cron-style
/// deployments where the scheduler captures output.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        info!("Report ready: {subject}");
        println!("{subject}\n\n{body}");
        Ok(())
    }
}
