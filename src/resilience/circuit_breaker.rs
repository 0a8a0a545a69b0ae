//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls short-circuit to a fallback
//! - Half-Open: one trial call decides whether to close again
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: now - last_failure > reset_timeout (on the next call)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per `category:operation`, created lazily on first failure
//! - Each breaker sits behind its own mutex; distinct keys never contend
//! - Single trial in Half-Open; an abandoned trial is re-admitted after
//!   another reset timeout so a cancelled caller cannot wedge the key
//! - Only the trial holder can close a Half-Open breaker

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::context::{BreakerKey, ErrorCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Gate decision for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No breaker for the operation objects.
    Allowed,
    /// Allowed as the single Half-Open trial for these breakers.
    Trial(Vec<BreakerKey>),
    /// Short-circuited by an open breaker.
    Rejected(BreakerKey),
}

/// State of a single breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    trial_started: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            trial_started: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Would a call be short-circuited right now? Does not transition.
    fn blocks(&self, now: Instant, reset_timeout: Duration) -> bool {
        match self.state {
            CircuitState::Closed => false,
            CircuitState::Open => !self.cooled_down(now, reset_timeout),
            CircuitState::HalfOpen => self
                .trial_started
                .is_some_and(|t| now.saturating_duration_since(t) <= reset_timeout),
        }
    }

    fn cooled_down(&self, now: Instant, reset_timeout: Duration) -> bool {
        self.last_failure
            .map_or(true, |t| now.saturating_duration_since(t) > reset_timeout)
    }

    /// Claim the trial slot if the breaker is due for one.
    fn try_begin_trial(&mut self, now: Instant, reset_timeout: Duration) -> bool {
        if self.blocks(now, reset_timeout) || self.state == CircuitState::Closed {
            return false;
        }
        self.state = CircuitState::HalfOpen;
        self.trial_started = Some(now);
        true
    }

    /// Record a successful call. Returns the new state if it changed.
    /// `trial` is whether this call held the Half-Open trial slot.
    pub fn on_success(&mut self, trial: bool) -> Option<CircuitState> {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen if trial => {
                self.state = CircuitState::Closed;
                self.consecutive_failures = 0;
                self.trial_started = None;
                Some(CircuitState::Closed)
            }
            // Admitted before the breaker opened; it says nothing about the
            // dependency now.
            CircuitState::HalfOpen | CircuitState::Open => None,
        }
    }

    /// Record a failed call. Returns the new state if it changed.
    pub fn on_failure(&mut self, now: Instant, failure_threshold: u32) -> Option<CircuitState> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);
        match self.state {
            CircuitState::Closed if self.consecutive_failures >= failure_threshold => {
                self.state = CircuitState::Open;
                Some(CircuitState::Open)
            }
            CircuitState::Closed | CircuitState::Open => None,
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.trial_started = None;
                Some(CircuitState::Open)
            }
        }
    }
}

/// Serializable view of one breaker for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub key: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Milliseconds since the last recorded failure.
    pub last_failure_ago_ms: Option<u64>,
}

/// Registry of breakers keyed by `category:operation`.
pub struct CircuitBreakers {
    breakers: DashMap<BreakerKey, Arc<Mutex<CircuitBreaker>>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

fn lock(breaker: &Mutex<CircuitBreaker>) -> MutexGuard<'_, CircuitBreaker> {
    breaker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CircuitBreakers {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: config.failure_threshold,
            reset_timeout: config.reset_timeout(),
        }
    }

    fn get(&self, key: &BreakerKey) -> Option<Arc<Mutex<CircuitBreaker>>> {
        self.breakers.get(key).map(|r| r.value().clone())
    }

    fn get_or_create(&self, key: &BreakerKey) -> Arc<Mutex<CircuitBreaker>> {
        self.breakers
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new())))
            .value()
            .clone()
    }

    /// Existing breakers guarding `operation`, across all categories.
    fn for_operation(&self, operation: &str) -> Vec<(BreakerKey, Arc<Mutex<CircuitBreaker>>)> {
        ErrorCategory::ALL
            .iter()
            .filter_map(|category| {
                let key = BreakerKey::new(*category, operation);
                self.get(&key).map(|b| (key, b))
            })
            .collect()
    }

    /// Gate a call to `operation`.
    ///
    /// Every breaker guarding the operation is locked, in `ErrorCategory::ALL`
    /// order, for the whole decision so two callers cannot both claim a trial.
    pub fn admit(&self, operation: &str) -> Admission {
        let now = Instant::now();
        let breakers = self.for_operation(operation);
        let mut guards: Vec<_> = breakers.iter().map(|(key, b)| (key, lock(b))).collect();

        if let Some((key, _)) = guards
            .iter()
            .find(|(_, breaker)| breaker.blocks(now, self.reset_timeout))
        {
            return Admission::Rejected((*key).clone());
        }

        let mut trials = Vec::new();
        for (key, breaker) in guards.iter_mut() {
            if breaker.try_begin_trial(now, self.reset_timeout) {
                tracing::info!(breaker = %key, "Circuit half-open, admitting trial call");
                metrics::record_breaker_state(&key.to_string(), CircuitState::HalfOpen);
                trials.push((*key).clone());
            }
        }

        if trials.is_empty() {
            Admission::Allowed
        } else {
            Admission::Trial(trials)
        }
    }

    /// Record a successful call to `operation` on every breaker guarding it.
    /// Only the breakers in `trials` may close from Half-Open.
    pub fn record_success(&self, operation: &str, trials: &[BreakerKey]) {
        for (key, breaker) in self.for_operation(operation) {
            if let Some(state) = lock(&breaker).on_success(trials.contains(&key)) {
                tracing::info!(breaker = %key, "Circuit closed after successful trial");
                metrics::record_breaker_state(&key.to_string(), state);
            }
        }
    }

    /// Record a failure against one breaker and return its resulting state.
    pub fn record_failure(&self, key: &BreakerKey) -> CircuitState {
        let breaker = self.get_or_create(key);
        let mut guard = lock(&breaker);
        if let Some(state) = guard.on_failure(Instant::now(), self.failure_threshold) {
            tracing::warn!(
                breaker = %key,
                consecutive_failures = guard.consecutive_failures(),
                "Circuit opened"
            );
            metrics::record_breaker_state(&key.to_string(), state);
        }
        guard.state()
    }

    pub fn state(&self, key: &BreakerKey) -> CircuitState {
        self.get(key)
            .map(|b| lock(&b).state())
            .unwrap_or(CircuitState::Closed)
    }

    pub fn is_open(&self, key: &BreakerKey) -> bool {
        self.state(key) == CircuitState::Open
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| {
                let breaker = lock(entry.value());
                BreakerSnapshot {
                    key: entry.key().to_string(),
                    state: breaker.state(),
                    consecutive_failures: breaker.consecutive_failures(),
                    last_failure_ago_ms: breaker
                        .last_failure
                        .map(|t| now.saturating_duration_since(t).as_millis() as u64),
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }
}
