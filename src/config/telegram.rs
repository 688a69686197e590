use serde::{Deserialize, Serialize};

/// Chat notification configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Override for the API base, mainly for tests
    pub api_base: Option<String>,
}

impl TelegramConfig {
    /// sendMessage endpoint for this bot token.
    pub fn send_message_url(&self) -> String {
        let base = self
            .api_base
            .as_deref()
            .unwrap_or("https://api.telegram.org");
        format!("{}/bot{}/sendMessage", base, self.bot_token)
    }

    /// Validate telegram configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bot_token.is_empty() {
            return Err(anyhow::anyhow!("telegram bot_token must not be empty"));
        }
        if self.chat_id.is_empty() {
            return Err(anyhow::anyhow!("telegram chat_id must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            api_base: None,
        };
        assert_eq!(
            config.send_message_url(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }
}
