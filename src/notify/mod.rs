// src/notify/mod.rs
//! Completion notifications
//!
//! After a successful instrumented call the watcher can post a short
//! "finished" message to a recipient. Delivery is best-effort: a
//! `NotifyError` is logged as a warning and never reaches the caller.
//!
//! - **Notifier**: the transport-agnostic sending interface
//! - **Telegram**: Telegram Bot API transport (`telegram` feature)

#[cfg(feature = "telegram")]
pub mod telegram;

#[cfg(feature = "telegram")]
pub use telegram::TelegramNotifier;

use crate::recording::record::{format_elapsed, format_timestamp};
use crate::utils::errors::Result;
use chrono::{Duration, NaiveDateTime};
use std::sync::Arc;
use thiserror::Error;

/// Delivery failures, downgraded to warnings by the watcher
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The recipient does not exist or cannot be reached by the bot
    #[error("unable to find chat with id {0}")]
    RecipientNotFound(String),

    /// The credential was rejected at send time
    #[error("unauthorized access (may be related to token)")]
    Unauthorized,

    /// Network or protocol failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sends a text message to a recipient
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, text: &str) -> std::result::Result<(), NotifyError>;
}

/// Message announcing that an instrumented call finished
pub fn completion_message(name: &str, end_time: &NaiveDateTime, elapsed: &Duration) -> String {
    format!(
        "{} finished running at {} (elapsed time {})",
        name,
        format_timestamp(end_time),
        format_elapsed(elapsed)
    )
}

/// Build the notifier for a bot token
///
/// Fails with a usage error if the token is rejected or if notification
/// support was not compiled in.
pub fn connect(token: &str) -> Result<Arc<dyn Notifier>> {
    #[cfg(feature = "telegram")]
    {
        Ok(Arc::new(TelegramNotifier::connect(token)?))
    }

    #[cfg(not(feature = "telegram"))]
    {
        let _ = token;
        Err(crate::utils::errors::WatchdogError::NotifierUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_completion_message() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(12, 0, 0, 0)
            .unwrap();
        let text = completion_message("train", &end, &Duration::seconds(90));
        assert_eq!(
            text,
            "train finished running at 2024-03-01 12:00:00.000000 (elapsed time 0:01:30.000000)"
        );
    }

    #[test]
    fn test_error_messages() {
        let err = NotifyError::RecipientNotFound("42".to_string());
        assert_eq!(err.to_string(), "unable to find chat with id 42");
    }

    #[cfg(not(feature = "telegram"))]
    #[test]
    fn test_connect_without_transport() {
        assert!(matches!(
            connect("123:abc"),
            Err(crate::utils::errors::WatchdogError::NotifierUnavailable)
        ));
    }
}
