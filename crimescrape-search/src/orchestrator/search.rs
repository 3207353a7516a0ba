//! Core orchestrator: concurrent module fan-out under a run deadline.
//!
//! Runs every registered module with the same query, at most
//! `max_concurrency` at a time, and folds the answers into one
//! [`AggregateResult`] keyed by module name.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::time::Instant;

use crate::circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::source::{ModuleRegistry, SourceModule};
use crate::types::{AggregateResult, Query, SourceResult};

use super::report::{ModuleDiagnostic, RunReport};

type ModuleOutcome = (Arc<dyn SourceModule>, Result<Option<SourceResult>>);

/// Fans a query out to every registered module.
///
/// Owns its module registry and, when enabled, a per-module circuit
/// breaker. Cheap to share behind an [`Arc`]; runs do not block each other.
#[derive(Debug)]
pub struct Orchestrator {
    registry: ModuleRegistry,
    max_concurrency: usize,
    run_timeout: Duration,
    breaker: Option<Mutex<CircuitBreaker>>,
}

impl Orchestrator {
    /// # Errors
    ///
    /// Returns [`SearchError::Config`](crate::SearchError::Config) if
    /// `config` fails validation.
    pub fn new(registry: ModuleRegistry, config: &SearchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            max_concurrency: config.max_concurrency,
            run_timeout: config.run_timeout(),
            breaker: BreakerSettings::from_config(config).map(|s| Mutex::new(CircuitBreaker::new(s))),
        })
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Run all modules and return the aggregate.
    ///
    /// Never fails: module errors and timeouts are logged and the module
    /// is left out. An empty aggregate means no module found anything.
    pub async fn run(&self, query: &Query) -> AggregateResult {
        self.run_with_report(query).await.result
    }

    /// Run all modules and return the aggregate with per-module diagnostics.
    ///
    /// # Pipeline
    ///
    /// 1. Skip modules whose circuit is open (breaker enabled only)
    /// 2. Fan out with [`StreamExt::buffer_unordered`], bounded by `max_concurrency`
    /// 3. Collect outcomes until all modules finish or the run deadline passes
    /// 4. Record modules still pending at the deadline as timed out
    pub async fn run_with_report(&self, query: &Query) -> RunReport {
        let deadline = Instant::now() + self.run_timeout;
        tracing::trace!(%query, "orchestrator run");

        let mut report = RunReport::default();
        let runnable = self.runnable_modules(&mut report);
        let mut pending: BTreeSet<String> =
            runnable.iter().map(|m| m.name().to_string()).collect();

        // Searches own their module and query.
        let query = Arc::new(query.clone());
        let searches: Vec<BoxFuture<'static, ModuleOutcome>> = runnable
            .into_iter()
            .map(|module| {
                let query = Arc::clone(&query);
                async move {
                    let outcome = module.search(&query).await;
                    (module, outcome)
                }
                .boxed()
            })
            .collect();
        let mut outcomes = stream::iter(searches).buffer_unordered(self.max_concurrency.max(1));

        loop {
            match tokio::time::timeout_at(deadline, outcomes.next()).await {
                Ok(Some((module, outcome))) => {
                    pending.remove(module.name());
                    self.record(module.name(), outcome, &mut report);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        pending = pending.len(),
                        timeout_secs = self.run_timeout.as_secs(),
                        "run deadline reached, abandoning pending modules"
                    );
                    break;
                }
            }
        }
        drop(outcomes);

        for name in &pending {
            self.with_breaker(|breaker| breaker.failed(name));
            report.diagnostics.push(ModuleDiagnostic::timed_out(name));
        }

        report.diagnostics.sort_by(|a, b| a.module.cmp(&b.module));
        tracing::debug!(
            results = report.result.len(),
            diagnostics = report.diagnostics.len(),
            "orchestrator run complete"
        );
        report
    }

    /// `(module, circuit state, consecutive failures)` for every module
    /// that has run at least once. Empty when the breaker is disabled.
    pub fn health_report(&self) -> Vec<(String, CircuitState, u32)> {
        self.with_breaker(|breaker| breaker.health_report())
            .unwrap_or_default()
    }

    fn runnable_modules(&self, report: &mut RunReport) -> Vec<Arc<dyn SourceModule>> {
        self.registry
            .iter()
            .filter(|module| {
                let admitted = self
                    .with_breaker(|breaker| breaker.admit(module.name()))
                    .unwrap_or(true);
                if !admitted {
                    tracing::debug!(module = module.name(), "circuit open, skipping module");
                    report.diagnostics.push(ModuleDiagnostic::skipped(module.name()));
                }
                admitted
            })
            .cloned()
            .collect()
    }

    fn record(&self, name: &str, outcome: Result<Option<SourceResult>>, report: &mut RunReport) {
        match outcome {
            Ok(Some(result)) => {
                tracing::info!(
                    module = name,
                    risk = %result.risk,
                    notices = result.notices.len(),
                    "module returned result"
                );
                self.with_breaker(|breaker| breaker.succeeded(name));
                report.result.insert(name, result);
            }
            Ok(None) => {
                tracing::debug!(module = name, "module found nothing");
                self.with_breaker(|breaker| breaker.succeeded(name));
            }
            Err(err) => {
                tracing::warn!(module = name, kind = err.kind(), error = %err, "module failed");
                self.with_breaker(|breaker| breaker.failed(name));
                report.diagnostics.push(ModuleDiagnostic::failed(name, &err));
            }
        }
    }

    fn with_breaker<T>(&self, f: impl FnOnce(&mut CircuitBreaker) -> T) -> Option<T> {
        let breaker = self.breaker.as_ref()?;
        let mut guard = breaker.lock().unwrap_or_else(|e| e.into_inner());
        Some(f(&mut guard))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::SearchError;
    use crate::orchestrator::DiagnosticKind;
    use crate::types::{Notice, RiskLevel};

    enum Behaviour {
        Return(Option<SourceResult>),
        Fail(fn() -> SearchError),
        Sleep(Duration, Option<SourceResult>),
    }

    struct StubModule {
        name: &'static str,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl StubModule {
        fn new(name: &'static str, behaviour: Behaviour) -> Self {
            Self {
                name,
                behaviour,
                calls: Arc::default(),
                active: Arc::default(),
                peak: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl SourceModule for StubModule {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _query: &Query) -> Result<Option<SourceResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let outcome = match &self.behaviour {
                Behaviour::Return(r) => Ok(r.clone()),
                Behaviour::Fail(make) => Err(make()),
                Behaviour::Sleep(d, r) => {
                    tokio::time::sleep(*d).await;
                    Ok(r.clone())
                }
            };
            self.active.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
    }

    fn result(risk: RiskLevel, id: &str) -> Option<SourceResult> {
        Some(SourceResult::new(risk).with_notice("notice", Notice::new(id, vec![])))
    }

    fn query() -> Query {
        Query::new("Ruja", "Ignatova").expect("valid")
    }

    fn orchestrator(registry: ModuleRegistry, config: SearchConfig) -> Orchestrator {
        Orchestrator::new(registry, &config).expect("valid config")
    }

    #[tokio::test]
    async fn aggregates_results_by_module_name() {
        let registry = ModuleRegistry::new()
            .with(StubModule::new("fbi", Behaviour::Return(result(RiskLevel::High, "a"))))
            .and_then(|r| r.with(StubModule::new("interpol", Behaviour::Return(result(RiskLevel::Dangerous, "b")))))
            .expect("registry");
        let agg = orchestrator(registry, SearchConfig::default()).run(&query()).await;

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.get("fbi").map(|r| r.risk), Some(RiskLevel::High));
        assert_eq!(agg.get("interpol").map(|r| r.risk), Some(RiskLevel::Dangerous));
    }

    #[tokio::test]
    async fn none_results_are_omitted() {
        let registry = ModuleRegistry::new()
            .with(StubModule::new("fbi", Behaviour::Return(None)))
            .and_then(|r| r.with(StubModule::new("interpol", Behaviour::Return(result(RiskLevel::Low, "x")))))
            .expect("registry");
        let report = orchestrator(registry, SearchConfig::default())
            .run_with_report(&query())
            .await;

        assert!(!report.result.contains("fbi"));
        assert!(report.result.contains("interpol"));
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn failing_module_does_not_block_others() {
        let registry = ModuleRegistry::new()
            .with(StubModule::new("fbi", Behaviour::Fail(|| SearchError::Captcha("wall".into()))))
            .and_then(|r| r.with(StubModule::new("interpol", Behaviour::Return(result(RiskLevel::Low, "x")))))
            .expect("registry");
        let report = orchestrator(registry, SearchConfig::default())
            .run_with_report(&query())
            .await;

        assert_eq!(report.result.modules().collect::<Vec<_>>(), vec!["interpol"]);
        let diag = report.diagnostic("fbi").expect("fbi diagnostic");
        assert_eq!(diag.kind, DiagnosticKind::Failed);
        assert_eq!(diag.error_kind, "captcha");
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_aggregate() {
        let agg = orchestrator(ModuleRegistry::new(), SearchConfig::default())
            .run(&query())
            .await;
        assert!(agg.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_slow_modules() {
        let registry = ModuleRegistry::new()
            .with(StubModule::new(
                "europol",
                Behaviour::Sleep(Duration::from_secs(600), result(RiskLevel::High, "late")),
            ))
            .and_then(|r| r.with(StubModule::new("interpol", Behaviour::Return(result(RiskLevel::Low, "x")))))
            .expect("registry");
        let config = SearchConfig {
            run_timeout_seconds: 5,
            ..Default::default()
        };
        let report = orchestrator(registry, config).run_with_report(&query()).await;

        assert!(report.result.contains("interpol"));
        assert!(!report.result.contains("europol"));
        assert_eq!(report.modules_with(DiagnosticKind::TimedOut), vec!["europol"]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let names = ["m0", "m1", "m2", "m3", "m4", "m5"];
        let mut registry = ModuleRegistry::new();
        for name in names {
            let mut module = StubModule::new(name, Behaviour::Sleep(Duration::from_millis(50), None));
            module.active = Arc::clone(&active);
            module.peak = Arc::clone(&peak);
            registry.register(module).expect("unique");
        }
        let config = SearchConfig {
            max_concurrency: 2,
            ..Default::default()
        };
        let report = orchestrator(registry, config).run_with_report(&query()).await;

        assert!(report.is_clean());
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn open_circuit_skips_module() {
        let failing = StubModule::new("fbi", Behaviour::Fail(|| SearchError::Module("layout changed".into())));
        let calls = Arc::clone(&failing.calls);
        let registry = ModuleRegistry::new().with(failing).expect("registry");
        let config = SearchConfig {
            breaker_enabled: true,
            breaker_failure_threshold: 2,
            breaker_cooldown_secs: 3600,
            ..Default::default()
        };
        let orch = orchestrator(registry, config);

        orch.run(&query()).await;
        orch.run(&query()).await;
        let third = orch.run_with_report(&query()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(third.modules_with(DiagnosticKind::Skipped), vec!["fbi"]);
        let health = orch.health_report();
        assert_eq!(health, vec![("fbi".to_string(), CircuitState::Open, 2)]);
    }

    #[tokio::test]
    async fn none_result_counts_as_success_for_breaker() {
        let registry = ModuleRegistry::new()
            .with(StubModule::new("interpol", Behaviour::Return(None)))
            .expect("registry");
        let config = SearchConfig {
            breaker_enabled: true,
            ..Default::default()
        };
        let orch = orchestrator(registry, config);
        orch.run(&query()).await;
        assert_eq!(
            orch.health_report(),
            vec![("interpol".to_string(), CircuitState::Closed, 0)]
        );
    }

    #[tokio::test]
    async fn failing_module_runs_every_time_without_breaker() {
        let failing = StubModule::new("fbi", Behaviour::Fail(|| SearchError::Module("layout changed".into())));
        let calls = Arc::clone(&failing.calls);
        let registry = ModuleRegistry::new().with(failing).expect("registry");
        let orch = orchestrator(registry, SearchConfig::default());

        for _ in 0..5 {
            let report = orch.run_with_report(&query()).await;
            assert!(report.modules_with(DiagnosticKind::Skipped).is_empty());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(orch.health_report().is_empty());
    }

    #[tokio::test]
    async fn run_can_be_spawned() {
        let registry = ModuleRegistry::new()
            .with(StubModule::new("interpol", Behaviour::Return(result(RiskLevel::Low, "x"))))
            .expect("registry");
        let orch = Arc::new(orchestrator(registry, SearchConfig::default()));

        let task = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run(&query()).await })
        };
        let agg = task.await.expect("task");
        assert!(agg.contains("interpol"));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = SearchConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        let err = Orchestrator::new(ModuleRegistry::new(), &config).unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }
}
