// src/notify.rs
//
// Operator notifications. Fire-and-forget: a failed send is logged and
// dropped, never retried, never propagated to the caller.

use crate::error::NotifyError;
use crate::types::NotifierConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

const TELEGRAM_API: &str = "https://api.telegram.org";

pub trait Notifier: Send + Sync + 'static {
    fn send(&self, text: &str) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramNotifier {
    http_client: reqwest::Client,
    token: Option<String>,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        if config.token.is_none() {
            info!("✈️ Telegram token not set, notifications will only be logged");
        }

        Ok(Self {
            http_client,
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    async fn post(&self, token: &str, text: &str) -> std::result::Result<(), NotifyError> {
        let url = send_message_url(token);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
        };

        let response = self.http_client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
                body: response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<no body>".to_string()),
            });
        }
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        let Some(token) = self.token.as_deref() else {
            debug!("✈️ (disabled) {}", text);
            return;
        };

        match self.post(token, text).await {
            Ok(()) => info!("✈️ Telegram sent"),
            Err(e) => error!("✈️ Telegram failed: {}", e),
        }
    }
}

fn send_message_url(token: &str) -> String {
    format!("{}/bot{}/sendMessage", TELEGRAM_API, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_url() {
        assert_eq!(
            send_message_url("123:abc"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_payload_shape() {
        let body = SendMessage {
            chat_id: "42",
            text: "hello",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["chat_id"], "42");
        assert_eq!(json["text"], "hello");
    }

    #[tokio::test]
    async fn test_disabled_notifier_is_a_no_op() {
        let notifier = TelegramNotifier::new(&NotifierConfig::default()).unwrap();
        assert!(!notifier.is_enabled());
        notifier.send("nothing leaves the process").await;
    }
}
