//! Per-provider circuit breaker.
//!
//! A provider that keeps failing across cycles gets skipped instead of
//! burning a rate-limit slot and a timeout every cycle. Three states:
//! Closed (normal), Open (blocked), HalfOpen (probing recovery). State
//! is in-memory and resets on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

/// Circuit breaker state for one provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Provider is failing, requests are blocked.
    Open,
    /// Recovery timeout elapsed, probe requests allowed.
    HalfOpen,
}

/// Circuit breaker tuning.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit blocks before probing.
    pub recovery_timeout: Duration,
    /// Probe successes needed to close again.
    pub probe_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            probe_success_threshold: 2,
        }
    }
}

#[derive(Debug, Default)]
struct Circuit {
    state: Option<CircuitState>,
    failures: u32,
    probe_successes: u32,
    last_failure: Option<Instant>,
}

impl Circuit {
    fn state(&self) -> CircuitState {
        self.state.unwrap_or(CircuitState::Closed)
    }
}

/// Thread-safe per-provider circuit breaker.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    /// Slightly wrong circuit state beats panicking mid-cycle.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether a request to the provider is allowed right now.
    ///
    /// Transitions Open to HalfOpen once the recovery timeout elapses.
    pub fn is_allowed(&self, provider: &str) -> bool {
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider.to_string()).or_default();

        match circuit.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = circuit
                    .last_failure
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);

                if recovered {
                    info!("Circuit for '{}' moving Open -> HalfOpen", provider);
                    circuit.state = Some(CircuitState::HalfOpen);
                    circuit.probe_successes = 0;
                }
                recovered
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider.to_string()).or_default();

        match circuit.state() {
            CircuitState::Closed => {
                circuit.failures = 0;
            }
            CircuitState::HalfOpen => {
                circuit.probe_successes += 1;
                if circuit.probe_successes >= self.config.probe_success_threshold {
                    info!("Circuit for '{}' closed after recovery", provider);
                    *circuit = Circuit::default();
                }
            }
            CircuitState::Open => {
                // is_allowed should have moved us to HalfOpen first
                debug!("Unexpected success for '{}' while circuit open", provider);
            }
        }
    }

    /// Record a failed call. A HalfOpen failure reopens immediately.
    pub fn record_failure(&self, provider: &str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(provider.to_string()).or_default();

        circuit.failures += 1;
        circuit.last_failure = Some(Instant::now());

        match circuit.state() {
            CircuitState::Closed => {
                if circuit.failures >= self.config.failure_threshold {
                    warn!(
                        "Circuit for '{}' opened after {} consecutive failures",
                        provider, circuit.failures
                    );
                    circuit.state = Some(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                warn!("Circuit for '{}' reopened by probe failure", provider);
                circuit.state = Some(CircuitState::Open);
                circuit.probe_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Current state for a provider.
    pub fn state(&self, provider: &str) -> CircuitState {
        self.lock()
            .get(provider)
            .map(Circuit::state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Force a provider's circuit back to Closed.
    pub fn reset(&self, provider: &str) {
        self.lock().remove(provider);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
