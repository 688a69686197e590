//! Spot ticker polling and threshold filtering.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

use crate::dispatcher::{execute_with_retry, Dispatcher, RetryPolicy};
use crate::error::{GatemonError, GatemonResult};

/// One raw spot ticker as served by the exchange API. Numeric fields arrive
/// as strings and stay strings until the filter parses what it needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Ticker {
    pub currency_pair: String,
    pub last: String,
    pub change_percentage: String,
    pub high_24h: String,
    pub low_24h: String,
    pub base_volume: String,
}

/// A ticker whose 24h change crossed the alert threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SignificantMove {
    pub symbol: String,
    pub percent_change: f64,
    pub last: String,
    pub high: String,
    pub low: String,
    pub volume: String,
}

/// Per-poller alert dedup context. Owned by the monitor loop and passed in
/// explicitly; one alert per symbol until the tracker is reset.
#[derive(Debug, Default)]
pub struct AlertTracker {
    alerted: HashSet<String>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep tickers whose absolute change percentage reaches `threshold`
    /// and that have not alerted before. Tickers with unparseable numbers
    /// are skipped.
    pub fn filter_significant(&mut self, tickers: &[Ticker], threshold: f64) -> Vec<SignificantMove> {
        let mut significant = Vec::new();
        for ticker in tickers {
            let raw = ticker.change_percentage.trim_end_matches('%');
            let Ok(percent_change) = raw.parse::<f64>() else {
                continue;
            };
            if percent_change.abs() < threshold || self.alerted.contains(&ticker.currency_pair) {
                continue;
            }
            self.alerted.insert(ticker.currency_pair.clone());
            significant.push(SignificantMove {
                symbol: ticker.currency_pair.clone(),
                percent_change,
                last: ticker.last.clone(),
                high: ticker.high_24h.clone(),
                low: ticker.low_24h.clone(),
                volume: ticker.base_volume.clone(),
            });
        }
        debug!(count = significant.len(), "significant moves this round");
        significant
    }
}

/// Fetch all spot tickers through the request dispatcher, retrying
/// transport failures per `policy`.
pub async fn fetch_tickers(
    dispatcher: &Dispatcher,
    url: &str,
    policy: &RetryPolicy,
) -> GatemonResult<Vec<Ticker>> {
    execute_with_retry(policy, "fetch_tickers", |_| async move {
        let response = dispatcher.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatemonError::internal(format!(
                "tickers endpoint answered {}",
                status
            )));
        }
        response
            .json::<Vec<Ticker>>()
            .await
            .map_err(|e| GatemonError::internal(format!("malformed tickers body: {}", e)))
    })
    .await
}
