use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request pacing configuration. A uniform random delay in
/// [delay_min_secs, delay_max_secs] is applied before each proxied request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub enabled: bool,
    pub delay_min_secs: f64,
    pub delay_max_secs: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_min_secs: 1.0,
            delay_max_secs: 3.0,
        }
    }
}

impl BehaviorConfig {
    pub fn delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs_f64(self.delay_min_secs),
            Duration::from_secs_f64(self.delay_max_secs),
        )
    }

    /// Validate behavior configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.delay_min_secs < 0.0 {
            return Err(anyhow::anyhow!("behavior delay_min_secs must not be negative"));
        }
        if self.delay_min_secs > self.delay_max_secs {
            return Err(anyhow::anyhow!(
                "behavior delay_min_secs must not exceed delay_max_secs"
            ));
        }
        Ok(())
    }
}
