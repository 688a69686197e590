use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gatemon::config::{Config, MonitorConfig, TelegramConfig};
use gatemon::dispatcher::{Dispatcher, RetryPolicy};
use gatemon::monitor::{fetch_tickers, Monitor, TelegramNotifier};
use gatemon::pool::ProxyPool;

async fn direct_dispatcher(cookie_dir: &std::path::Path) -> Arc<Dispatcher> {
    let mut config = Config::default();
    config.proxy.enabled = false;
    config.behavior.enabled = false;
    config.cookie.save_path = cookie_dir.join("cookies.json").display().to_string();
    let pool = Arc::new(ProxyPool::new(
        config.proxy.rotation_interval,
        config.proxy.blacklist_time(),
    ));
    Arc::new(Dispatcher::new(&config, pool).await)
}

fn tickers_body() -> serde_json::Value {
    serde_json::json!([
        {
            "currency_pair": "BTC_USDT",
            "last": "65000",
            "change_percentage": "41.2",
            "high_24h": "66000",
            "low_24h": "45000",
            "base_volume": "1234"
        },
        {
            "currency_pair": "ETH_USDT",
            "last": "3000",
            "change_percentage": "2.0",
            "high_24h": "3100",
            "low_24h": "2900",
            "base_volume": "999"
        }
    ])
}

mod monitor_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_tickers_parses_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/spot/tickers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tickers_body()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dispatcher = direct_dispatcher(dir.path()).await;
        let url = format!("{}/api/v4/spot/tickers", server.uri());
        let tickers = fetch_tickers(&dispatcher, &url, &RetryPolicy::zero_delay(2))
            .await
            .unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].currency_pair, "BTC_USDT");
        assert_eq!(tickers[0].change_percentage, "41.2");
    }

    /// End to end: one poll round fetches tickers, filters the mover above
    /// threshold and delivers exactly one alert.
    #[tokio::test]
    async fn test_poll_once_delivers_one_alert() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/spot/tickers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tickers_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bottok/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dispatcher = direct_dispatcher(dir.path()).await;
        let monitor_config = MonitorConfig {
            tickers_url: format!("{}/api/v4/spot/tickers", server.uri()),
            percent_threshold: 30.0,
            check_interval_secs: 60,
        };
        let notifier = TelegramNotifier::new(TelegramConfig {
            bot_token: "tok".to_string(),
            chat_id: "42".to_string(),
            api_base: Some(server.uri()),
        });

        let mut monitor = Monitor::new(dispatcher, monitor_config, Some(notifier));
        monitor.poll_once().await;
        // A second round must not re-alert the same symbol
        monitor.poll_once().await;
    }
}
