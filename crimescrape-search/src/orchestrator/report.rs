//! What happened during one orchestrator run, beyond the aggregate itself.

use serde::Serialize;

use crate::error::SearchError;
use crate::types::AggregateResult;

/// Why a module contributed nothing to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The module returned an error.
    Failed,
    /// The run deadline passed before the module finished.
    TimedOut,
    /// The module's circuit breaker is open.
    Skipped,
}

/// One module's non-result outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDiagnostic {
    pub module: String,
    pub kind: DiagnosticKind,
    /// Error kind for failures (`"captcha"`, `"schema"`, ...), empty otherwise.
    pub error_kind: &'static str,
    pub detail: String,
}

impl ModuleDiagnostic {
    pub fn failed(module: &str, error: &SearchError) -> Self {
        Self {
            module: module.to_string(),
            kind: DiagnosticKind::Failed,
            error_kind: error.kind(),
            detail: error.to_string(),
        }
    }

    pub fn timed_out(module: &str) -> Self {
        Self {
            module: module.to_string(),
            kind: DiagnosticKind::TimedOut,
            error_kind: "",
            detail: "run deadline exceeded".into(),
        }
    }

    pub fn skipped(module: &str) -> Self {
        Self {
            module: module.to_string(),
            kind: DiagnosticKind::Skipped,
            error_kind: "",
            detail: "circuit open".into(),
        }
    }
}

/// Aggregate plus per-module diagnostics, sorted by module name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub result: AggregateResult,
    pub diagnostics: Vec<ModuleDiagnostic>,
}

impl RunReport {
    /// `true` when every module ran to completion without error.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostic(&self, module: &str) -> Option<&ModuleDiagnostic> {
        self.diagnostics.iter().find(|d| d.module == module)
    }

    /// Module names with a diagnostic of `kind`.
    pub fn modules_with(&self, kind: DiagnosticKind) -> Vec<&str> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.module.as_str())
            .collect()
    }
}
