//! Batch mode: read one query file, look the person up, write the results.
//!
//! The query file is JSON with `fname` and `lname`. The results file holds
//! the aggregate result (module name to `{risk, notices}`), indented by four
//! spaces, and is only written when at least one module found something.

use std::io::Write;
use std::path::{Path, PathBuf};

use crimescrape_search::{AggregateResult, CachePolicy, CrimeScrape, Query, Status};
use serde::Serialize;

use crate::error::{AppError, Result};

/// Parse a query file.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the file cannot be read and
/// [`AppError::Query`] if it is not a valid `{fname, lname}` object.
pub fn read_query(path: &Path) -> Result<Query> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Query(format!("{}: {e}", path.display())))
}

/// Write `result` as four-space-indented JSON.
///
/// # Errors
///
/// Returns [`AppError::Io`] on write failure.
pub fn write_results(path: &Path, result: &AggregateResult) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    result
        .serialize(&mut serializer)
        .map_err(|e| AppError::Io(e.into()))?;
    buf.push(b'\n');

    let mut file = std::fs::File::create(path)?;
    file.write_all(&buf)?;
    Ok(())
}

/// Run one batch lookup.
///
/// Any results file left by a previous run is removed first, so a missing
/// file afterwards always means "nothing found". Returns the absolute path
/// of the written file, or `None` when no module matched.
///
/// # Errors
///
/// Returns an error if the query file is invalid, the lookup task fails or
/// the results file cannot be written.
pub async fn run_standalone(
    service: &CrimeScrape,
    query_file: &Path,
    results_file: &Path,
) -> Result<Option<PathBuf>> {
    match std::fs::remove_file(results_file) {
        Ok(()) => tracing::debug!(path = %results_file.display(), "removed previous results"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let query = read_query(query_file)?;
    tracing::trace!(query = %query, "standalone lookup");

    let lookup = service.lookup_or_run(&query, CachePolicy::Use).await?;
    if lookup.data.is_empty() {
        tracing::info!("no results found");
        return Ok(None);
    }

    write_results(results_file, &lookup.data)?;
    let path = std::fs::canonicalize(results_file)?;
    tracing::info!(
        path = %path.display(),
        modules = lookup.data.len(),
        cached = lookup.status == Status::Cached,
        "results written"
    );
    Ok(Some(path))
}
