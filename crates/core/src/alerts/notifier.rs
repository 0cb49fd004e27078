//! Delivery boundary.
//!
//! The engine hands fully formatted alerts across this trait and knows
//! nothing about transports. A delivery failure is scoped to one alert
//! on one channel.

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Alert;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Slack,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Slack => write!(f, "slack"),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery via {channel} failed: {message}")]
    Delivery { channel: Channel, message: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, alert: &Alert, channel: Channel) -> Result<(), NotifyError>;
}

/// Writes alerts to the log. The default sink until a real transport
/// is wired in.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, alert: &Alert, channel: Channel) -> Result<(), NotifyError> {
        info!(
            "[{}] {} L{} {} | {} | {}",
            channel,
            alert.ticker,
            alert.level as u8,
            alert.trigger_type,
            alert.message,
            alert.recommended_action
        );
        Ok(())
    }
}
