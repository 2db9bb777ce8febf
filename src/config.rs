//! Configuration for certwatch
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{CertwatchError, Result};

/// Certwatch - certification watchlist and change-monitoring service
#[derive(Parser, Debug, Clone)]
#[command(name = "certwatch")]
#[command(about = "Watches terminal certification records and reports attribute changes")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Path of the persisted watchlist file
    #[arg(long, env = "DATA_FILE", default_value = "models.json")]
    pub data_file: PathBuf,

    /// Certification registry search endpoint
    #[arg(
        long,
        env = "LOOKUP_URL",
        default_value = "https://www.crefia.or.kr/portal/store/cardTerminal/cardTerminalList.xx"
    )]
    pub lookup_url: String,

    /// Per-call lookup timeout in milliseconds
    #[arg(long, env = "LOOKUP_TIMEOUT_MS", default_value = "10000")]
    pub lookup_timeout_ms: u64,

    /// Outbound notification webhook URL (empty disables delivery)
    #[arg(long, env = "NOTIFY_URL", default_value = "")]
    pub notify_url: String,

    /// Notifier delivery timeout in milliseconds
    #[arg(long, env = "NOTIFY_TIMEOUT_MS", default_value = "5000")]
    pub notify_timeout_ms: u64,

    /// Monitor cycle interval in seconds
    #[arg(long, env = "MONITOR_INTERVAL_SECS", default_value = "3600")]
    pub monitor_interval_secs: u64,

    /// First local hour (inclusive) of the active monitoring window
    #[arg(long, env = "WINDOW_START_HOUR", default_value = "8")]
    pub window_start_hour: u32,

    /// Last local hour (exclusive) of the active monitoring window.
    /// Equal start and end hours keep the monitor active around the clock.
    #[arg(long, env = "WINDOW_END_HOUR", default_value = "22")]
    pub window_end_hour: u32,

    /// Maximum number of watchlist entries
    #[arg(long, env = "WATCHLIST_CAPACITY", default_value = "20")]
    pub watchlist_capacity: usize,

    /// Pending-action token lifetime in seconds
    #[arg(long, env = "PENDING_TTL_SECS", default_value = "900")]
    pub pending_ttl_secs: u64,

    /// Register exact matches immediately instead of asking for confirmation
    #[arg(long, env = "AUTO_CONFIRM", default_value = "false")]
    pub auto_confirm: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.window_start_hour > 23 || self.window_end_hour > 23 {
            return Err(CertwatchError::Validation(
                "WINDOW_START_HOUR and WINDOW_END_HOUR must be within 0-23".to_string(),
            ));
        }

        if self.watchlist_capacity == 0 {
            return Err(CertwatchError::Validation(
                "WATCHLIST_CAPACITY must be at least 1".to_string(),
            ));
        }

        if self.lookup_url.is_empty() {
            return Err(CertwatchError::Validation(
                "LOOKUP_URL must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> Args {
        Args::parse_from(["certwatch"])
    }

    #[test]
    fn defaults_are_valid() {
        let args = default_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.watchlist_capacity, 20);
        assert_eq!(args.pending_ttl().as_secs(), 900);
    }

    #[test]
    fn rejects_out_of_range_window() {
        let mut args = default_args();
        args.window_end_hour = 24;
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut args = default_args();
        args.watchlist_capacity = 0;
        assert!(args.validate().is_err());
    }
}
