//! Chat alert delivery through the request dispatcher.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TelegramConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{GatemonError, GatemonResult};
use crate::monitor::ticker::SignificantMove;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends alert messages to a Telegram chat. Outbound traffic goes through
/// the dispatcher, so notifications rotate proxies like everything else.
pub struct TelegramNotifier {
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self { config }
    }

    /// POST one message. A non-2xx response or an `ok:false` body is a
    /// `Notification` error.
    pub async fn send(&self, dispatcher: &Dispatcher, text: &str) -> GatemonResult<()> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
        };
        let response = dispatcher
            .post_json(&self.config.send_message_url(), &body)
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatemonError::notification(format!(
                "sendMessage answered {}",
                status
            )));
        }

        let reply: ApiReply = response
            .json()
            .await
            .map_err(|e| GatemonError::notification(format!("malformed API reply: {}", e)))?;
        if !reply.ok {
            return Err(GatemonError::notification(
                reply
                    .description
                    .unwrap_or_else(|| "API returned ok=false".to_string()),
            ));
        }

        info!("alert delivered");
        Ok(())
    }
}

/// Render one significant move as the alert message text.
pub fn format_alert(mv: &SignificantMove) -> String {
    let direction = if mv.percent_change > 0.0 {
        "🚀 UP"
    } else {
        "📉 DOWN"
    };
    format!(
        "{} | {}\nchange: {:.2}%\nlast: {}\n24h high/low: {} / {}\nvolume: {}\n#GateIO #Crypto",
        direction, mv.symbol, mv.percent_change, mv.last, mv.high, mv.low, mv.volume
    )
}
