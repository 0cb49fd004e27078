//! Threshold rule evaluation.
//!
//! Pure functions from a record plus configured thresholds to trigger
//! events. No I/O, no clock reads; the caller supplies `now`, so a
//! given input always produces the same events.
//!
//! Rules are gated by asset type: fundamentals rules apply to stocks,
//! the volume rule to ETFs, the price rule to both. `Unknown` tickers
//! get no rule evaluation at all, only the staleness check.

use std::time::Duration;

use chrono::{DateTime, Utc};
use folioalert_market_data::{metric, AssetType, TickerRecord};
use log::debug;
use rust_decimal::Decimal;

use crate::config::{Direction, ThresholdConfig};

/// Canonical trigger type names, as written in threshold configuration.
pub mod trigger {
    pub const REVENUE_GROWTH_FLOOR: &str = "revenue_growth_floor";
    pub const GROSS_MARGIN_FLOOR: &str = "gross_margin_floor";
    pub const PRICE_CHANGE_ALERT: &str = "price_change_alert";
    pub const VOLUME_SPIKE_THRESHOLD: &str = "volume_spike_threshold";
}

/// Canonical event type names carried on emitted trigger events.
pub mod event {
    pub const REVENUE_GROWTH_SLOWDOWN: &str = "revenue_growth_slowdown";
    pub const GROSS_MARGIN_COMPRESSION: &str = "gross_margin_compression";
    pub const PRICE_CHANGE_ALERT: &str = "price_change_alert";
    pub const VOLUME_SPIKE: &str = "volume_spike";
    pub const DATA_STALE: &str = "data_stale";
}

/// One breached threshold, before alert formatting.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerEvent {
    pub ticker: String,
    pub trigger_type: String,
    pub current_value: Decimal,
    pub threshold_value: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Evaluate every configured threshold for one record.
///
/// Events come out in threshold-config order, with any staleness event
/// last. A missing metric silently skips its rule; the other rules for
/// the ticker still run.
pub fn evaluate(
    record: &TickerRecord,
    asset_type: AssetType,
    thresholds: &[ThresholdConfig],
    now: DateTime<Utc>,
    staleness_threshold: Duration,
) -> Vec<TriggerEvent> {
    let mut events = Vec::new();

    if asset_type != AssetType::Unknown {
        for threshold in thresholds.iter().filter(|t| t.ticker == record.ticker) {
            let event = match threshold.trigger_type.as_str() {
                trigger::REVENUE_GROWTH_FLOOR if asset_type == AssetType::Stock => {
                    ratio_event(record, metric::REVENUE_GROWTH, threshold, event::REVENUE_GROWTH_SLOWDOWN, now)
                }
                trigger::GROSS_MARGIN_FLOOR if asset_type == AssetType::Stock => {
                    ratio_event(record, metric::GROSS_MARGIN, threshold, event::GROSS_MARGIN_COMPRESSION, now)
                }
                trigger::PRICE_CHANGE_ALERT => price_change_event(record, threshold, now),
                trigger::VOLUME_SPIKE_THRESHOLD if asset_type == AssetType::Etf => {
                    volume_spike_event(record, threshold, now)
                }
                other => {
                    debug!(
                        "Threshold '{}' does not apply to '{}' ({:?}), skipping",
                        other, record.ticker, asset_type
                    );
                    None
                }
            };
            events.extend(event);
        }
    }

    if record.is_stale(now, staleness_threshold) {
        events.push(stale_event(record, now, staleness_threshold));
    }

    events
}

/// The synthetic staleness event. Values are in hours.
pub fn stale_event(
    record: &TickerRecord,
    now: DateTime<Utc>,
    staleness_threshold: Duration,
) -> TriggerEvent {
    let hours = |d: Duration| Decimal::from(d.as_secs()) / Decimal::from(3600);
    TriggerEvent {
        ticker: record.ticker.clone(),
        trigger_type: event::DATA_STALE.to_string(),
        current_value: hours(record.age(now)),
        threshold_value: hours(staleness_threshold),
        observed_at: now,
    }
}

fn fires(direction: Direction, value: Decimal, threshold: Decimal) -> bool {
    match direction {
        Direction::Above => value > threshold,
        Direction::Below => value < threshold,
        Direction::AbsoluteChange => value.abs() >= threshold,
    }
}

/// Ratio thresholds are accepted in either convention: `0.70` and `70`
/// both mean seventy percent, since the metrics are stored as fractions.
fn normalize_ratio(threshold: Decimal) -> Decimal {
    if threshold > Decimal::ONE {
        threshold / Decimal::ONE_HUNDRED
    } else {
        threshold
    }
}

fn ratio_event(
    record: &TickerRecord,
    metric_name: &str,
    threshold: &ThresholdConfig,
    event_type: &str,
    now: DateTime<Utc>,
) -> Option<TriggerEvent> {
    let value = record.metric(metric_name)?;
    let bound = normalize_ratio(threshold.comparison_value);

    fires(threshold.direction, value, bound).then(|| TriggerEvent {
        ticker: record.ticker.clone(),
        trigger_type: event_type.to_string(),
        current_value: value,
        threshold_value: bound,
        observed_at: now,
    })
}

fn price_change_event(
    record: &TickerRecord,
    threshold: &ThresholdConfig,
    now: DateTime<Utc>,
) -> Option<TriggerEvent> {
    let current = record.metric(metric::CURRENT_PRICE)?;
    let previous = record.metric(metric::PREVIOUS_CLOSE)?;
    if previous == Decimal::ZERO {
        return None;
    }

    let change_pct = (current - previous) / previous * Decimal::ONE_HUNDRED;

    fires(threshold.direction, change_pct, threshold.comparison_value).then(|| TriggerEvent {
        ticker: record.ticker.clone(),
        trigger_type: event::PRICE_CHANGE_ALERT.to_string(),
        current_value: change_pct,
        threshold_value: threshold.comparison_value,
        observed_at: now,
    })
}

fn volume_spike_event(
    record: &TickerRecord,
    threshold: &ThresholdConfig,
    now: DateTime<Utc>,
) -> Option<TriggerEvent> {
    let volume = record.metric(metric::VOLUME)?;
    let average = record.metric(metric::AVG_VOLUME)?;
    if average == Decimal::ZERO {
        return None;
    }

    let ratio = volume / average;

    fires(threshold.direction, ratio, threshold.comparison_value).then(|| TriggerEvent {
        ticker: record.ticker.clone(),
        trigger_type: event::VOLUME_SPIKE.to_string(),
        current_value: ratio,
        threshold_value: threshold.comparison_value,
        observed_at: now,
    })
}
