//! # gatemon - exchange monitor bot with a rotating proxy subsystem
//!
//! gatemon polls exchange spot tickers and pushes alerts to a chat channel,
//! routing all outbound traffic through rotating upstream proxies. The core
//! is the proxy subsystem: it decodes VLESS connection descriptors,
//! translates them into sing-box or v2ray config files, supervises the
//! local engine processes, and wraps every outbound HTTP call with proxy
//! rotation, identity rotation, cookie persistence and retry-with-failover.
//!
//! ## Usage example
//!
//! ```rust,no_run
//! use gatemon::config::Config;
//! use gatemon::dispatcher::Dispatcher;
//! use gatemon::engine::{EngineKind, EngineSupervisor};
//! use gatemon::pool::ProxyPool;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file_with_env("config/config.toml").await?;
//!     let mut supervisor = EngineSupervisor::new(
//!         EngineKind::SingBox,
//!         config.proxy.engine_binary(),
//!         &config.proxy.config_dir,
//!     );
//!     let pool = Arc::new(ProxyPool::new(
//!         config.proxy.rotation_interval,
//!         config.proxy.blacklist_time(),
//!     ));
//!     pool.initialize(config.proxy.proxy_mode(), &mut supervisor, &config.proxy)
//!         .await;
//!     let dispatcher = Dispatcher::new(&config, Arc::clone(&pool)).await;
//!     let response = dispatcher.get("https://api.ipify.org?format=json").await?;
//!     println!("{}", response.text().await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod pool;

// Re-export commonly used types
pub use descriptor::VlessDescriptor;
pub use dispatcher::{BackoffStrategy, CookieStore, Dispatcher, RetryPolicy, UserAgentPool};
pub use engine::{EngineKind, EngineProcess, EngineSupervisor};
pub use error::{ErrorSeverity, GatemonError, GatemonResult};
pub use pool::{PoolEntry, ProxyPool};
