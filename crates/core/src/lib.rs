//! FolioAlert Core Crate
//!
//! The monitoring pipeline over the market-data acquisition layer:
//! classify tickers, evaluate threshold rules, format and prioritize
//! alerts, and deliver them through the notifier boundary.
//!
//! # Overview
//!
//! A monitoring cycle walks the configured portfolio with bounded
//! concurrency:
//!
//! ```text
//! +----------------+
//! | MonitorService |  (one cycle over the portfolio)
//! +----------------+
//!    |          |
//!    v          v
//! +---------+ +-----------------+
//! | Fetcher | | AssetClassifier |  (overrides, reported type)
//! +---------+ +-----------------+
//!    |               |
//!    v               v
//! +----------------------+
//! |    rules::evaluate   |  (pure; per-ticker trigger events)
//! +----------------------+
//!            |
//!            v
//! +----------------------+
//! |     AlertEngine      |  (dedupe, format, order, dispatch)
//! +----------------------+
//!            |
//!            v
//! +----------------------+
//! |       Notifier       |  (email, slack, log)
//! +----------------------+
//! ```
//!
//! Per-ticker failures never abort a cycle; they are collected on the
//! [`CycleReport`].

pub mod alerts;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod rules;
pub mod service;
pub mod store;

pub use alerts::{Alert, AlertEngine, AlertLevel, AlertPolicy, Channel, LogNotifier, Notifier, NotifyError};
pub use classifier::AssetClassifier;
pub use config::{screen_thresholds, Direction, MonitorConfig, ThresholdConfig};
pub use errors::MonitorError;
pub use rules::{evaluate, event, stale_event, trigger, TriggerEvent};
pub use service::{CycleReport, MonitorService};
pub use store::MemoryRecordStore;
