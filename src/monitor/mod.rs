//! Ticker monitor loop: poll, filter, notify.

pub mod notifier;
pub mod ticker;

pub use notifier::{format_alert, TelegramNotifier};
pub use ticker::{fetch_tickers, AlertTracker, SignificantMove, Ticker};

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::dispatcher::{Dispatcher, RetryPolicy};

/// Everything the monitor loop owns; no shared globals.
pub struct Monitor {
    dispatcher: Arc<Dispatcher>,
    config: MonitorConfig,
    notifier: Option<TelegramNotifier>,
    tracker: AlertTracker,
    retry_policy: RetryPolicy,
}

impl Monitor {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        config: MonitorConfig,
        notifier: Option<TelegramNotifier>,
    ) -> Self {
        Self {
            dispatcher,
            config,
            notifier,
            tracker: AlertTracker::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// One poll round. Failures are logged, never fatal.
    pub async fn poll_once(&mut self) {
        let tickers =
            match fetch_tickers(&self.dispatcher, &self.config.tickers_url, &self.retry_policy)
                .await
            {
                Ok(tickers) => tickers,
                Err(e) => {
                    error!(error = %e, "ticker fetch failed");
                    return;
                }
            };

        let moves = self
            .tracker
            .filter_significant(&tickers, self.config.percent_threshold);
        if moves.is_empty() {
            info!("no significant price changes");
            return;
        }

        info!(count = moves.len(), "significant moves found");
        let Some(notifier) = &self.notifier else {
            warn!("no notifier configured, dropping alerts");
            return;
        };
        for mv in &moves {
            if let Err(e) = notifier.send(&self.dispatcher, &format_alert(mv)).await {
                error!(symbol = %mv.symbol, error = %e, "alert delivery failed");
            }
        }
    }

    /// Poll forever at the configured interval.
    pub async fn run(mut self) {
        info!(
            interval = self.config.check_interval_secs,
            threshold = self.config.percent_threshold,
            "monitor loop started"
        );
        loop {
            self.poll_once().await;
            sleep(self.config.check_interval()).await;
        }
    }
}
