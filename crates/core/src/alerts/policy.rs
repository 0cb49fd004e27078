//! Severity and wording policy.
//!
//! Maps event types to alert levels, message templates, recommended
//! actions and links. Kept as data so operators can retune severities
//! without touching the engine. An event type the policy does not know
//! yields `None` and the engine skips that one alert.

use std::collections::HashMap;

use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::rules::{event, TriggerEvent};

use super::AlertLevel;

/// A rendered alert body, pre-delivery.
pub(super) struct Rendered {
    pub message: String,
    pub recommended_action: String,
    pub link: Option<String>,
}

pub struct AlertPolicy {
    levels: HashMap<String, AlertLevel>,
    /// Price-move magnitude (percent) beyond which any price alert is
    /// escalated to `Immediate`, whatever the table says.
    existential_move_pct: Decimal,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        let levels = [
            (event::PRICE_CHANGE_ALERT, AlertLevel::Daily),
            (event::GROSS_MARGIN_COMPRESSION, AlertLevel::Daily),
            (event::REVENUE_GROWTH_SLOWDOWN, AlertLevel::Daily),
            (event::VOLUME_SPIKE, AlertLevel::Daily),
            (event::DATA_STALE, AlertLevel::Weekly),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            levels,
            existential_move_pct: dec!(20),
        }
    }
}

impl AlertPolicy {
    pub fn with_level(mut self, event_type: &str, level: AlertLevel) -> Self {
        self.levels.insert(event_type.to_string(), level);
        self
    }

    pub fn with_existential_move_pct(mut self, pct: Decimal) -> Self {
        self.existential_move_pct = pct;
        self
    }

    /// Severity for an event, with the large-move escalation applied.
    pub fn level_for(&self, event: &TriggerEvent) -> Option<AlertLevel> {
        let base = self.levels.get(event.trigger_type.as_str()).copied();

        if event.trigger_type == event::PRICE_CHANGE_ALERT
            && event.current_value.abs() > self.existential_move_pct
        {
            return Some(AlertLevel::Immediate);
        }

        if base.is_none() {
            warn!(
                "No severity configured for event type '{}', skipping alert",
                event.trigger_type
            );
        }
        base
    }

    pub(super) fn render(&self, event: &TriggerEvent) -> Option<Rendered> {
        let quote_link = Some(format!("https://finance.yahoo.com/quote/{}", event.ticker));
        let pct = |v: Decimal| (v * dec!(100)).round_dp(1);

        let rendered = match event.trigger_type.as_str() {
            event::GROSS_MARGIN_COMPRESSION => Rendered {
                message: format!(
                    "{} gross margin {}% is below the {}% floor",
                    event.ticker,
                    pct(event.current_value),
                    pct(event.threshold_value)
                ),
                recommended_action: "Review margin trend".to_string(),
                link: quote_link,
            },
            event::REVENUE_GROWTH_SLOWDOWN => Rendered {
                message: format!(
                    "{} revenue growth {}% is below the {}% floor",
                    event.ticker,
                    pct(event.current_value),
                    pct(event.threshold_value)
                ),
                recommended_action: "Review latest earnings".to_string(),
                link: quote_link,
            },
            event::PRICE_CHANGE_ALERT => Rendered {
                message: format!(
                    "{} moved {}% against a {}% alert threshold",
                    event.ticker,
                    event.current_value.round_dp(1),
                    event.threshold_value.round_dp(1)
                ),
                recommended_action: "Review position size".to_string(),
                link: quote_link,
            },
            event::VOLUME_SPIKE => Rendered {
                message: format!(
                    "{} volume is running {}x its trailing average (threshold {}x)",
                    event.ticker,
                    event.current_value.round_dp(1),
                    event.threshold_value.round_dp(1)
                ),
                recommended_action: "Check for a news catalyst".to_string(),
                link: quote_link,
            },
            event::DATA_STALE => Rendered {
                message: format!(
                    "{} data is {} hours old (freshness bound {} hours)",
                    event.ticker,
                    event.current_value.round_dp(1),
                    event.threshold_value.round_dp(1)
                ),
                recommended_action: "Verify data sources".to_string(),
                link: None,
            },
            other => {
                warn!("No template for event type '{}', skipping alert", other);
                return None;
            }
        };

        Some(rendered)
    }
}
