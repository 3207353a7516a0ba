//! Source orchestration: concurrent module fan-out, failure isolation and
//! an overall run deadline.
//!
//! Every registered [`SourceModule`](crate::source::SourceModule) receives
//! the same query. Module errors never escape a run: each one is logged,
//! recorded as a [`ModuleDiagnostic`] and treated as "no result".

pub mod report;
pub mod search;

pub use report::{DiagnosticKind, ModuleDiagnostic, RunReport};
pub use search::Orchestrator;
