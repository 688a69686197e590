use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use gatemon::config::{Config, EngineChoice};
use gatemon::dispatcher::Dispatcher;
use gatemon::engine::{EngineKind, EngineSupervisor};
use gatemon::monitor::{Monitor, TelegramNotifier};
use gatemon::pool::ProxyPool;

#[derive(Parser)]
#[command(name = "gatemon")]
#[command(about = "Exchange ticker monitor with rotating proxy support")]
struct Args {
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("gatemon={}", level))
        .init();

    info!("Starting gatemon");

    // Load configuration
    let config = Config::from_file_with_env(&args.config).await?;
    info!("Loaded configuration from {}", args.config);

    let engine_kind = match config.proxy.engine {
        EngineChoice::SingBox => EngineKind::SingBox,
        EngineChoice::V2ray => EngineKind::V2ray,
    };
    let mut supervisor = EngineSupervisor::new(
        engine_kind,
        config.proxy.engine_binary(),
        &config.proxy.config_dir,
    );

    let pool = Arc::new(ProxyPool::new(
        config.proxy.rotation_interval,
        config.proxy.blacklist_time(),
    ));
    if config.proxy.enabled {
        pool.initialize(config.proxy.proxy_mode(), &mut supervisor, &config.proxy)
            .await;
    } else {
        info!("proxying disabled, all requests go direct");
    }

    let dispatcher = Arc::new(Dispatcher::new(&config, Arc::clone(&pool)).await);
    let notifier = config.telegram.clone().map(TelegramNotifier::new);
    if notifier.is_none() {
        warn!("no telegram section configured, alerts will only be logged");
    }
    let monitor = Monitor::new(Arc::clone(&dispatcher), config.monitor.clone(), notifier);

    // Run until interrupted
    tokio::select! {
        _ = monitor.run() => {}
        _ = signal::ctrl_c() => {
            warn!("Received CTRL+C, shutting down gracefully...");
        }
    }

    supervisor.stop_all().await;
    info!("gatemon stopped");
    Ok(())
}
