//! Per-source rate limiting with strict call spacing.
//!
//! Providers publish a calls-per-window budget, but serving the budget
//! as a burst at the window edge still trips provider-side limits when
//! many tickers fetch concurrently. The limiter therefore spaces calls
//! evenly: one call per `window / max_calls` (5 per minute becomes one
//! call every 12 seconds). Each caller reserves the next free slot
//! under the lock, so the gate is the single point of serialization
//! per source regardless of how wide the worker pool is.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::provider::RateLimitSpec;

/// Reserved slot state for one source.
#[derive(Debug)]
struct Gate {
    /// When the next call may start.
    next_slot: Instant,
    /// Minimum spacing between consecutive calls.
    spacing: Duration,
}

impl Gate {
    fn new(spec: &RateLimitSpec) -> Self {
        Self {
            next_slot: Instant::now(),
            spacing: spec.min_spacing(),
        }
    }

    /// Reserve the next slot and return how long to wait for it.
    fn reserve(&mut self, now: Instant) -> Duration {
        if self.next_slot <= now {
            self.next_slot = now + self.spacing;
            Duration::ZERO
        } else {
            let wait = self.next_slot - now;
            self.next_slot += self.spacing;
            wait
        }
    }
}

/// Evenly-spaced rate limiter for multiple sources.
///
/// Safe for concurrent callers targeting different tickers against the
/// same source. It never errors, it only delays.
pub struct RateLimiter {
    gates: Mutex<HashMap<String, Gate>>,
    configs: Mutex<HashMap<String, RateLimitSpec>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            gates: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the gates mutex, recovering from poison if necessary.
    ///
    /// Worst case of recovering is slightly wrong spacing, which beats
    /// panicking mid-cycle.
    fn lock_gates(&self) -> MutexGuard<'_, HashMap<String, Gate>> {
        self.gates.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter gates mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimitSpec>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the limit for a source. Resets any existing gate.
    pub fn configure(&self, source: &str, spec: RateLimitSpec) {
        let mut configs = self.lock_configs();
        configs.insert(source.to_string(), spec);
        drop(configs);

        let mut gates = self.lock_gates();
        gates.remove(source);
    }

    /// Wait until a call to the source is permitted, then return.
    ///
    /// Slots are granted in reservation order, so concurrent callers
    /// queue behind each other at the configured spacing.
    pub async fn acquire(&self, source: &str) {
        let wait = {
            let mut gates = self.lock_gates();
            let gate = gates
                .entry(source.to_string())
                .or_insert_with(|| self.gate_for(source));
            gate.reserve(Instant::now())
        };

        if wait > Duration::ZERO {
            debug!("Rate limiter: waiting {:?} for source '{}'", wait, source);
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self, source: &str) -> bool {
        let mut gates = self.lock_gates();
        let gate = gates
            .entry(source.to_string())
            .or_insert_with(|| self.gate_for(source));

        let now = Instant::now();
        if gate.next_slot <= now {
            gate.next_slot = now + gate.spacing;
            true
        } else {
            false
        }
    }

    fn gate_for(&self, source: &str) -> Gate {
        let configs = self.lock_configs();
        match configs.get(source) {
            Some(spec) => Gate::new(spec),
            None => Gate::new(&RateLimitSpec::default()),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
