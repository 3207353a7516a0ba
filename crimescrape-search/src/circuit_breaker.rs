//! Optional per-module circuit breaker.
//!
//! Enabled with [`SearchConfig::breaker_enabled`]. A module that fails
//! `failure_threshold` runs in a row is skipped until the cooldown has
//! passed. After that exactly one trial run is admitted; its outcome either
//! closes the circuit or re-opens it for another cooldown.
//!
//! ```text
//! Closed --threshold failures--> Open --cooldown--> HalfOpen (one trial)
//!    ^                             ^                    |
//!    |                             +------ failure -----+
//!    +----------------------- success ------------------+
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::SearchConfig;

/// Where a module's circuit stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Skipped until the cooldown passes.
    Open,
    /// A single trial run has been admitted and has not reported back.
    HalfOpen,
}

/// Thresholds for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl BreakerSettings {
    /// `None` when the breaker is disabled in `config`.
    pub fn from_config(config: &SearchConfig) -> Option<Self> {
        config.breaker_enabled.then(|| Self {
            failure_threshold: config.breaker_failure_threshold,
            cooldown: Duration::from_secs(config.breaker_cooldown_secs),
        })
    }
}

#[derive(Debug, Default)]
struct Tracker {
    failures: u32,
    opened_at: Option<Instant>,
    trial_started_at: Option<Instant>,
}

impl Tracker {
    fn state(&self) -> CircuitState {
        match (self.opened_at, self.trial_started_at) {
            (None, _) => CircuitState::Closed,
            (Some(_), None) => CircuitState::Open,
            (Some(_), Some(_)) => CircuitState::HalfOpen,
        }
    }
}

/// Consecutive-failure tracking for every module seen so far.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    modules: HashMap<String, Tracker>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            modules: HashMap::new(),
        }
    }

    /// Whether `module` may run now.
    ///
    /// Admitting the trial run of an open circuit moves it to
    /// [`CircuitState::HalfOpen`]; further callers are turned away until the
    /// trial reports back. A trial that never reports (its run was dropped)
    /// is replaced after another cooldown.
    pub fn admit(&mut self, module: &str) -> bool {
        let cooldown = self.settings.cooldown;
        let Some(tracker) = self.modules.get_mut(module) else {
            return true;
        };
        let since = match (tracker.opened_at, tracker.trial_started_at) {
            (None, _) => return true,
            (Some(opened), None) => opened,
            (Some(_), Some(trial)) => trial,
        };
        if since.elapsed() < cooldown {
            return false;
        }
        tracker.trial_started_at = Some(Instant::now());
        true
    }

    /// The module ran to completion, with or without a result.
    pub fn succeeded(&mut self, module: &str) {
        self.modules.insert(module.to_string(), Tracker::default());
    }

    /// The module failed or missed the run deadline.
    pub fn failed(&mut self, module: &str) {
        let threshold = self.settings.failure_threshold;
        let tracker = self.modules.entry(module.to_string()).or_default();
        tracker.failures = tracker.failures.saturating_add(1);
        if tracker.trial_started_at.is_some() || tracker.failures >= threshold {
            tracker.opened_at = Some(Instant::now());
            tracker.trial_started_at = None;
        }
    }

    /// Unseen modules are [`CircuitState::Closed`].
    pub fn state(&self, module: &str) -> CircuitState {
        self.modules
            .get(module)
            .map_or(CircuitState::Closed, Tracker::state)
    }

    /// `(module, state, consecutive failures)`, sorted by module name.
    pub fn health_report(&self) -> Vec<(String, CircuitState, u32)> {
        let mut report: Vec<_> = self
            .modules
            .iter()
            .map(|(name, tracker)| (name.clone(), tracker.state(), tracker.failures))
            .collect();
        report.sort_by(|a, b| a.0.cmp(&b.0));
        report
    }
}
