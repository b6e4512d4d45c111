// src/notify/telegram.rs
//! Telegram Bot API notifier
//!
//! The token is checked at setup: a malformed token or one rejected by
//! `getMe` is a fatal configuration error. Network failures during that
//! check are only logged, so an offline machine can still run experiments.

use crate::notify::{Notifier, NotifyError};
use crate::utils::errors::{Result, WatchdogError};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_BASE_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier posting messages through a Telegram bot
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramNotifier {
    /// Create a notifier and verify the token against the Bot API
    pub fn connect(token: &str) -> Result<Self> {
        Self::connect_to(API_BASE_URL, token)
    }

    /// Same as `connect`, against a custom API endpoint
    pub fn connect_to(base_url: &str, token: &str) -> Result<Self> {
        validate_token(token)?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WatchdogError::ConfigError(format!("HTTP client: {}", e)))?;

        let notifier = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        };
        notifier.verify()?;
        Ok(notifier)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn verify(&self) -> Result<()> {
        match self.client.get(self.method_url("getMe")).send() {
            Ok(response) => match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Err(
                    WatchdogError::InvalidNotifierToken(format!("getMe returned {}", response.status())),
                ),
                status if status.is_success() => {
                    info!("Telegram notifier ready");
                    Ok(())
                }
                status => {
                    warn!("Unexpected getMe status {}, keeping notifier", status);
                    Ok(())
                }
            },
            Err(e) => {
                warn!(
                    "Unable to reach Telegram API to verify token: {}",
                    e.without_url()
                );
                Ok(())
            }
        }
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, recipient: &str, text: &str) -> std::result::Result<(), NotifyError> {
        debug!("Sending Telegram message to {}", recipient);

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessageRequest {
                chat_id: recipient,
                text,
            })
            .send()
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::BAD_REQUEST => Err(NotifyError::RecipientNotFound(recipient.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NotifyError::Unauthorized),
            status if status.is_success() => {
                let body: ApiResponse = response
                    .json()
                    .map_err(transport_error)?;
                if body.ok {
                    Ok(())
                } else {
                    Err(NotifyError::Transport(
                        body.description.unwrap_or_else(|| "request rejected".to_string()),
                    ))
                }
            }
            status => Err(NotifyError::Transport(format!("HTTP {}", status))),
        }
    }
}

/// Request URLs embed the token, so they never reach error text
fn transport_error(e: reqwest::Error) -> NotifyError {
    NotifyError::Transport(e.without_url().to_string())
}

/// Bot tokens look like `<numeric bot id>:<secret>`
fn validate_token(token: &str) -> Result<()> {
    let valid = match token.split_once(':') {
        Some((id, secret)) => {
            !id.is_empty()
                && id.chars().all(|c| c.is_ascii_digit())
                && !secret.is_empty()
                && !secret.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(WatchdogError::InvalidNotifierToken(
            "token must have the form <bot id>:<secret>".to_string(),
        ))
    }
}
