//! Construction and validation of per-source results.
//!
//! [`build`] is the way modules create results. [`validate`] checks a loosely
//! typed JSON structure produced by older modules against the same schema and
//! yields the same [`SourceResult`] type, so cache entries built either way
//! are interchangeable.

use std::collections::BTreeMap;
use std::sync::Once;

use serde_json::Value;

use crate::error::{Result, SearchError};
use crate::types::{Notice, RiskLevel, SourceResult};

static VALIDATE_DEPRECATION: Once = Once::new();

/// Build a single-notice result for `source_key`.
///
/// A missing `id` becomes `""` and missing `charges` become `[]`; neither is
/// ever absent from the output.
///
/// # Errors
///
/// Returns [`SearchError::Schema`] if `risk` is not exactly one of
/// `Low`, `Medium`, `High` or `Dangerous`.
///
/// # Examples
///
/// ```
/// let result = crimescrape_search::response::build(
///     "High",
///     "fbi-most-wanted",
///     None,
///     Some(vec!["Wire fraud".to_string()]),
/// )?;
/// assert_eq!(result.notices["fbi-most-wanted"].id, "");
/// # Ok::<(), crimescrape_search::SearchError>(())
/// ```
pub fn build(
    risk: &str,
    source_key: &str,
    id: Option<&str>,
    charges: Option<Vec<String>>,
) -> Result<SourceResult> {
    let risk: RiskLevel = risk.parse()?;
    if source_key.is_empty() {
        return Err(SearchError::Schema("notice key must not be empty".into()));
    }
    let notice = Notice::new(id.unwrap_or_default(), charges.unwrap_or_default());
    Ok(SourceResult::new(risk).with_notice(source_key, notice))
}

/// Check an externally constructed result against the canonical schema.
///
/// Deprecated path kept for older module outputs; new modules use [`build`].
///
/// # Errors
///
/// Returns [`SearchError::Schema`] naming the first offending field.
pub fn validate(candidate: &Value) -> Result<SourceResult> {
    VALIDATE_DEPRECATION.call_once(|| {
        tracing::warn!("response::validate is deprecated, build results with response::build");
    });

    let object = candidate
        .as_object()
        .ok_or_else(|| schema("result must be a JSON object"))?;

    let risk = match object.get("risk") {
        Some(Value::String(s)) => s.parse::<RiskLevel>()?,
        Some(_) => return Err(schema("risk must be a string")),
        None => return Err(schema("missing field: risk")),
    };

    let notices = match object.get("notices") {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(schema("notices must be an object")),
        None => return Err(schema("missing field: notices")),
    };

    let mut validated = BTreeMap::new();
    for (key, details) in notices {
        validated.insert(key.clone(), validate_notice(key, details)?);
    }

    Ok(SourceResult {
        risk,
        notices: validated,
    })
}

fn validate_notice(key: &str, details: &Value) -> Result<Notice> {
    let details = details
        .as_object()
        .ok_or_else(|| schema(format!("notices.{key} must be an object")))?;

    let id = match details.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(schema(format!("notices.{key}.id must be a string"))),
        None => return Err(schema(format!("missing field: notices.{key}.id"))),
    };

    let raw_charges = match details.get("charges") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(schema(format!("notices.{key}.charges must be an array"))),
        None => return Err(schema(format!("missing field: notices.{key}.charges"))),
    };

    let charges = raw_charges
        .iter()
        .enumerate()
        .map(|(i, charge)| {
            charge
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| schema(format!("notices.{key}.charges[{i}] must be a string")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Notice { id, charges })
}

fn schema(msg: impl Into<String>) -> SearchError {
    SearchError::Schema(msg.into())
}
