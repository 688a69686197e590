use serde::{Deserialize, Serialize};

/// User-Agent rotation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserAgentConfig {
    pub enabled: bool,
    pub rotation: RotationMode,
    /// Agents used when rotation = "pool", or as the fallback pool
    pub custom_agents: Vec<String>,
}

/// How the outbound identity is picked per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Draw from the built-in generator pool
    #[default]
    Random,
    /// Draw only from the configured custom agents
    Pool,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rotation: RotationMode::Random,
            custom_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0".to_string(),
            ],
        }
    }
}

impl UserAgentConfig {
    /// Validate user agent configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enabled && self.custom_agents.is_empty() {
            return Err(anyhow::anyhow!(
                "user_agent custom_agents must not be empty when rotation is enabled"
            ));
        }
        Ok(())
    }
}
