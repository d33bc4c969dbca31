// crates/resilience/src/circuit_breaker.rs
//! Circuit breaker pattern implementation
//!
//! Time is read from `tokio::time::Instant`, so a paused test runtime can
//! move a breaker through its cooldown with `tokio::time::advance`.

use crate::error::{ResilienceError, ResilienceResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, testing if the remote recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(label)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    failure_threshold: usize,
    /// How long the circuit stays open
    open_duration: Duration,
    /// Successful requests needed to close from half-open
    success_threshold: usize,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration
    pub fn new(failure_threshold: usize, open_duration: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_duration,
            success_threshold: 1,
        }
    }

    /// Sets the success threshold
    pub fn with_success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Returns the failure threshold
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Returns the open duration
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(120))
    }
}

/// Point-in-time view of a breaker, for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: usize,
}

impl fmt::Display for BreakerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.consecutive_failures, self.state)
    }
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    opened_at: Option<Instant>,
}

/// Circuit breaker implementation
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<CircuitBreakerState>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            name: "default".to_string(),
            config,
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
        }
    }

    /// Sets the name used in logs and errors
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the current state
    pub fn state(&self) -> CircuitState {
        self.state.lock().map(|s| s.state).unwrap_or(CircuitState::Open)
    }

    /// Number of consecutive failures recorded
    pub fn failure_count(&self) -> usize {
        self.state.lock().map(|s| s.failure_count).unwrap_or(0)
    }

    /// State and failure count, read together
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.state
            .lock()
            .map(|s| BreakerSnapshot {
                state: s.state,
                consecutive_failures: s.failure_count,
            })
            .unwrap_or(BreakerSnapshot {
                state: CircuitState::Open,
                consecutive_failures: 0,
            })
    }

    /// Records a successful operation
    pub fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            match state.state {
                CircuitState::HalfOpen => {
                    state.success_count += 1;
                    if state.success_count >= self.config.success_threshold {
                        log::info!("Circuit '{}' closed after recovery", self.name);
                        state.state = CircuitState::Closed;
                        state.failure_count = 0;
                        state.success_count = 0;
                        state.opened_at = None;
                    }
                }
                CircuitState::Closed => {
                    state.failure_count = 0;
                }
                CircuitState::Open => {}
            }
        }
    }

    /// Records a failed operation
    pub fn record_failure(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failure_count += 1;
            state.success_count = 0;

            let should_open = match state.state {
                CircuitState::HalfOpen => true,
                CircuitState::Closed => state.failure_count >= self.config.failure_threshold,
                CircuitState::Open => false,
            };
            if should_open {
                log::warn!(
                    "Circuit '{}' opened after {} failures, blocking for {:?}",
                    self.name,
                    state.failure_count,
                    self.config.open_duration
                );
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
            }
        }
    }

    /// Checks if a request can proceed
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and lets
    /// the request through as a probe.
    pub fn can_proceed(&self) -> ResilienceResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ResilienceError::Custom("Lock poisoned".to_string()))?;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_duration {
                    log::debug!("Circuit '{}' half-open, probing", self.name);
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    Ok(())
                } else {
                    Err(ResilienceError::CircuitBreakerOpen {
                        name: self.name.clone(),
                        failures: state.failure_count,
                        retry_in: self.config.open_duration - elapsed,
                    })
                }
            }
        }
    }
}
