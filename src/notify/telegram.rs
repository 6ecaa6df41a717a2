use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::MessageSender;
use crate::error::DeliveryError;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Sends messages to one Telegram chat through the Bot API
pub struct TelegramSender {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
    base_url: String,
}

impl TelegramSender {
    pub fn new(bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            base_url: TELEGRAM_API_URL.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: false,
        };

        let response = self.http.post(self.endpoint()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(chat_id = %self.chat_id, "Telegram message delivered");
        Ok(())
    }
}
