use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ticker polling and alert thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Exchange spot tickers endpoint
    pub tickers_url: String,
    /// Absolute 24h change percentage that triggers an alert
    pub percent_threshold: f64,
    /// Seconds between polls
    pub check_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tickers_url: "https://api.gate.io/api/v4/spot/tickers".to_string(),
            percent_threshold: 30.0,
            check_interval_secs: 60,
        }
    }
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Validate monitor configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tickers_url.is_empty() {
            return Err(anyhow::anyhow!("monitor tickers_url must not be empty"));
        }
        if self.percent_threshold <= 0.0 {
            return Err(anyhow::anyhow!("monitor percent_threshold must be positive"));
        }
        if self.check_interval_secs == 0 {
            return Err(anyhow::anyhow!("monitor check_interval_secs must be at least 1"));
        }
        Ok(())
    }
}
