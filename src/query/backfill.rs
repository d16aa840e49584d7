//! Result padding with generated fixtures

use serde::{Deserialize, Serialize};

use super::query::Query;
use crate::batch::Batch;
use crate::error::Result;
use crate::observability::{log_event_with_fields, Event};
use crate::predicate::Constraints;

/// What happens to generated resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backfill {
    /// Added to the result only
    Ephemeral,
    /// Created in the store, then added to the result
    Persistent,
}

impl Backfill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backfill::Ephemeral => "ephemeral",
            Backfill::Persistent => "persistent",
        }
    }
}

/// Pad `batch` up to the query's limit with resources satisfying its filter.
/// Without a limit, an empty result gets a random fixture count.
pub(crate) fn backfill(query: &Query, mode: Backfill, batch: &Batch) -> Result<usize> {
    let target = query.target();
    let missing = match query.get_limit() {
        Some(limit) => limit.saturating_sub(batch.len()),
        None if batch.is_empty() => target.fixture_count(),
        None => 0,
    };
    if missing == 0 {
        return Ok(0);
    }

    let constraints = query
        .predicate()
        .map(|p| p.constraints())
        .unwrap_or_else(Constraints::new);
    let generated = target.generate_many(missing, &constraints)?;
    if mode == Backfill::Persistent {
        target.create_many(&generated)?;
    }
    batch.extend(generated)?;

    target
        .registry()
        .metrics_registry()
        .add_resources_backfilled(missing as u64);
    log_event_with_fields(
        Event::QueryBackfilled,
        &[
            ("type", target.name()),
            ("mode", mode.as_str()),
            ("count", missing.to_string().as_str()),
        ],
    );
    Ok(missing)
}
