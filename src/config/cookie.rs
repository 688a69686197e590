use serde::{Deserialize, Serialize};

/// Durable cookie jar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    pub enabled: bool,
    /// Path of the JSON cookie jar file
    pub save_path: String,
    /// Domains worth persisting cookies for; empty keeps everything
    pub domains: Vec<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_path: "cookies.json".to_string(),
            domains: vec!["gate.io".to_string(), "www.gate.io".to_string()],
        }
    }
}
