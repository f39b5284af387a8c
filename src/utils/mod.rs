pub mod config;
pub mod formatting;

pub use config::{Config, Credentials, EntityConfig, Thresholds};
