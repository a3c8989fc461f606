//! Circuit breaker shielding the analysis backend.
//!
//! Closed forwards calls and counts consecutive failures; more than three
//! trips the breaker. Open rejects everything for 30 s, then HalfOpen
//! admits a single probe: success closes the circuit, failure re-opens it.
//! A quiet 60 s in Closed resets the failure counter.
//!
//! The hot path is a counter update under a `std::sync::Mutex`; the
//! critical section is a few loads and stores, so a mutex beats any
//! message-passing scheme here.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

/// Consecutive failures beyond this count trip the breaker.
const FAILURE_THRESHOLD: u32 = 3;

/// How long Open lasts before the breaker half-opens.
const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Quiet period in Closed after which the failure count resets.
const CLOSED_INTERVAL: Duration = Duration::from_secs(60);

/// Probes admitted while HalfOpen.
const HALF_OPEN_MAX_PROBES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpen;

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    /// Probes currently in flight while HalfOpen.
    probes_in_flight: u32,
    /// When the current state (or Closed counting window) began.
    since: Instant,
    /// Bumped on every state transition so results from a previous
    /// generation cannot corrupt the current one.
    generation: u64,
}

pub struct Breaker {
    name: String,
    inner: Mutex<Inner>,
}

impl Breaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                probes_in_flight: 0,
                since: Instant::now(),
                generation: 0,
            }),
        }
    }

    /// Ask to make a call. Returns a generation token to hand back to
    /// [`Breaker::on_success`] / [`Breaker::on_failure`], or
    /// [`CircuitOpen`] when the call must not be made.
    pub fn acquire(&self) -> Result<u64, CircuitOpen> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        self.advance(&mut inner, now);

        match inner.state {
            BreakerState::Closed => Ok(inner.generation),
            BreakerState::Open => Err(CircuitOpen),
            BreakerState::HalfOpen => {
                if inner.probes_in_flight >= HALF_OPEN_MAX_PROBES {
                    return Err(CircuitOpen);
                }
                inner.probes_in_flight += 1;
                Ok(inner.generation)
            }
        }
    }

    pub fn on_success(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.generation != generation {
            return;
        }
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                info!(breaker = %self.name, "probe succeeded, closing circuit");
                Self::transition(&mut inner, BreakerState::Closed);
            }
            BreakerState::Open => {}
        }
    }

    pub fn on_failure(&self, generation: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.generation != generation {
            return;
        }
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures > FAILURE_THRESHOLD {
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "failure threshold exceeded, opening circuit"
                    );
                    Self::transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, re-opening circuit");
                Self::transition(&mut inner, BreakerState::Open);
            }
            BreakerState::Open => {}
        }
    }

    /// Current state, with time-based transitions applied.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.advance(&mut inner, Instant::now());
        inner.state
    }

    /// Apply transitions driven purely by elapsed time.
    fn advance(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Open if now.duration_since(inner.since) >= OPEN_TIMEOUT => {
                info!(breaker = %self.name, "open timeout elapsed, half-opening circuit");
                Self::transition(inner, BreakerState::HalfOpen);
            }
            BreakerState::Closed
                if inner.consecutive_failures > 0
                    && now.duration_since(inner.since) >= CLOSED_INTERVAL =>
            {
                inner.consecutive_failures = 0;
                inner.since = now;
            }
            _ => {}
        }
    }

    fn transition(inner: &mut Inner, state: BreakerState) {
        inner.state = state;
        inner.consecutive_failures = 0;
        inner.probes_in_flight = 0;
        inner.since = Instant::now();
        inner.generation += 1;
    }
}
