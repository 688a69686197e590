//! Runtime configuration.
//!
//! TOML file with one section per subsystem, loaded once at startup.
//! `from_file_with_env` expands `${VAR}` / `${VAR:-default}` expressions so
//! secrets like the Telegram bot token can stay out of the file.

pub mod behavior;
pub mod cookie;
pub mod monitor;
pub mod proxy;
pub mod telegram;
pub mod user_agent;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{info, warn};

pub use behavior::BehaviorConfig;
pub use cookie::CookieConfig;
pub use monitor::MonitorConfig;
pub use proxy::{EngineChoice, ProxyConfig, ProxyMode, ProxyModeKind};
pub use telegram::TelegramConfig;
pub use user_agent::{RotationMode, UserAgentConfig};

/// gatemon main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Proxy subsystem: mode, descriptors, rotation and blacklist knobs
    pub proxy: ProxyConfig,
    /// Outbound identity rotation
    pub user_agent: UserAgentConfig,
    /// Durable per-domain cookie jar
    pub cookie: CookieConfig,
    /// Request pacing behavior
    pub behavior: BehaviorConfig,
    /// Ticker polling and alert thresholds
    pub monitor: MonitorConfig,
    /// Chat notification endpoint (optional)
    pub telegram: Option<TelegramConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Load configuration with `${VAR}` environment expansion.
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let expanded = expand_env_vars(&content);
        let config: Config = toml::from_str(&expanded)?;
        config.validate()?;
        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.proxy.validate()?;
        self.user_agent.validate()?;
        self.behavior.validate()?;
        self.monitor.validate()?;
        if let Some(telegram) = &self.telegram {
            telegram.validate()?;
        }
        Ok(())
    }
}

/// Expand `${VAR}` and `${VAR:-default}` expressions in config content.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_expr = &result[start + 2..start + end];
            let replacement = if let Some(default_pos) = var_expr.find(":-") {
                let var_name = &var_expr[..default_pos];
                let default_value = &var_expr[default_pos + 2..];
                env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            } else {
                env::var(var_expr).unwrap_or_else(|_| {
                    warn!(
                        "Environment variable '{}' not found, using empty string",
                        var_expr
                    );
                    String::new()
                })
            };

            result.replace_range(start..start + end + 1, &replacement);
        } else {
            break; // Malformed ${VAR expression
        }
    }

    result
}
