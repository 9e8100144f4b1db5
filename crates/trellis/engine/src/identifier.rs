//! Run identifier parsing and lookup
//!
//! User input for "which run" is a single string that may be either a run
//! id or a logical instant. Lookup tries the run id reading first, then
//! the instant reading. Neither matching is not an error here; the caller
//! decides whether to fail or create.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use trellis_store::{PlatformStore, RunSelector};
use trellis_types::{RunId, RunRecord, WorkflowId};

use crate::error::EngineResult;

/// Accepted instant layouts besides RFC 3339, tried in order.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a raw string as an instant.
///
/// Accepts RFC 3339 (offset normalized to UTC), a naive datetime with an
/// optional fractional part (read as UTC), or a bare date (read as UTC
/// midnight). Anything else is `None`.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Look up a run by raw user input, trying run id first, then instant.
///
/// The parsed instant is returned even when no run matched, so a caller
/// creating a run can seed its logical instant from the input.
pub async fn find_run_by_identifier(
    store: &dyn PlatformStore,
    workflow_id: &WorkflowId,
    value: &str,
) -> EngineResult<(Option<RunRecord>, Option<DateTime<Utc>>)> {
    let by_id = store
        .find_run(workflow_id, &RunSelector::ById(RunId::new(value)))
        .await?;
    if by_id.is_some() {
        return Ok((by_id, None));
    }

    let Some(instant) = parse_instant(value) else {
        return Ok((None, None));
    };
    let by_instant = store
        .find_run(workflow_id, &RunSelector::ByLogicalInstant(instant))
        .await?;
    Ok((by_instant, Some(instant)))
}
