//! Alert engine: dedupe, format, prioritize, deliver.

use std::collections::HashSet;

use log::warn;
use rust_decimal::Decimal;

use crate::rules::TriggerEvent;

use super::{Alert, AlertPolicy, Channel, Notifier};

pub struct AlertEngine {
    policy: AlertPolicy,
}

impl AlertEngine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    /// Turn a cycle's trigger events into an ordered alert batch.
    ///
    /// Duplicates (same ticker and trigger type) keep the first
    /// occurrence. Events with no severity or template are skipped
    /// one at a time. The batch comes out sorted by level, then by
    /// relative deviation from the threshold, then by ticker.
    pub fn process(&self, events: Vec<TriggerEvent>) -> Vec<Alert> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut alerts = Vec::new();

        for event in events {
            let key = (event.ticker.clone(), event.trigger_type.clone());
            if !seen.insert(key) {
                continue;
            }

            let (Some(level), Some(rendered)) =
                (self.policy.level_for(&event), self.policy.render(&event))
            else {
                continue;
            };

            alerts.push(Alert {
                ticker: event.ticker,
                level,
                trigger_type: event.trigger_type,
                current_value: event.current_value,
                threshold_value: event.threshold_value,
                timestamp: event.observed_at,
                message: rendered.message,
                recommended_action: rendered.recommended_action,
                link: rendered.link,
            });
        }

        alerts.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| relative_deviation(b).cmp(&relative_deviation(a)))
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        alerts
    }

    /// Deliver a batch in order, every alert to every channel.
    ///
    /// A failed delivery is logged and skipped; it never blocks the
    /// rest of the batch. Returns the number of successful deliveries.
    pub async fn dispatch(
        &self,
        alerts: &[Alert],
        notifier: &dyn Notifier,
        channels: &[Channel],
    ) -> usize {
        let mut delivered = 0;

        for alert in alerts {
            for channel in channels {
                match notifier.deliver(alert, *channel).await {
                    Ok(()) => delivered += 1,
                    Err(e) => warn!(
                        "Failed to deliver '{}' alert for '{}': {}",
                        alert.trigger_type, alert.ticker, e
                    ),
                }
            }
        }

        delivered
    }
}

/// How far the observed value sits from its threshold, as a fraction
/// of the threshold. Larger means a more severe breach within a level.
fn relative_deviation(alert: &Alert) -> Decimal {
    let distance = (alert.current_value - alert.threshold_value).abs();
    if alert.threshold_value == Decimal::ZERO {
        alert.current_value.abs()
    } else {
        distance / alert.threshold_value.abs()
    }
}
