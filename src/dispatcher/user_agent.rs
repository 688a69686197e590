//! Per-request identity rotation.

use rand::seq::SliceRandom;

use crate::config::{RotationMode, UserAgentConfig};

/// Generator pool used in `random` rotation mode.
const BUILTIN_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
];

/// Rotating User-Agent source. `random` draws from the built-in generator
/// pool, `pool` draws only from the configured custom agents.
pub struct UserAgentPool {
    config: UserAgentConfig,
}

impl UserAgentPool {
    pub fn new(config: UserAgentConfig) -> Self {
        Self { config }
    }

    /// Pick one identity string, or None when rotation is disabled.
    pub fn pick(&self) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let mut rng = rand::thread_rng();
        let agent = match self.config.rotation {
            RotationMode::Random => BUILTIN_AGENTS
                .choose(&mut rng)
                .map(|a| a.to_string())
                .or_else(|| self.config.custom_agents.choose(&mut rng).cloned()),
            RotationMode::Pool => self.config.custom_agents.choose(&mut rng).cloned(),
        };
        agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_yields_none() {
        let pool = UserAgentPool::new(UserAgentConfig {
            enabled: false,
            ..Default::default()
        });
        assert_eq!(pool.pick(), None);
    }

    #[test]
    fn test_pool_mode_uses_custom_agents() {
        let pool = UserAgentPool::new(UserAgentConfig {
            enabled: true,
            rotation: RotationMode::Pool,
            custom_agents: vec!["agent-a".to_string(), "agent-b".to_string()],
        });
        for _ in 0..20 {
            let agent = pool.pick().unwrap();
            assert!(agent == "agent-a" || agent == "agent-b");
        }
    }

    #[test]
    fn test_random_mode_always_yields() {
        let pool = UserAgentPool::new(UserAgentConfig::default());
        assert!(pool.pick().is_some());
    }
}
