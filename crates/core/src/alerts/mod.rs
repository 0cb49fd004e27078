//! Alert formatting, prioritization and delivery.

mod engine;
mod notifier;
mod policy;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub use engine::AlertEngine;
pub use notifier::{Channel, LogNotifier, Notifier, NotifyError};
pub use policy::AlertPolicy;

/// Delivery urgency. Lower numbers are more urgent and sort first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Act now.
    Immediate = 1,
    /// Fold into the daily digest.
    Daily = 2,
    /// Fold into the weekly review.
    Weekly = 3,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "IMMEDIATE"),
            Self::Daily => write!(f, "DAILY"),
            Self::Weekly => write!(f, "WEEKLY"),
        }
    }
}

/// A formatted, prioritized alert ready for delivery.
#[derive(Clone, Debug, Serialize)]
pub struct Alert {
    pub ticker: String,
    pub level: AlertLevel,
    pub trigger_type: String,
    pub current_value: Decimal,
    pub threshold_value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub recommended_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}
