//! Batch resolution of FETCH queries
//!
//! A request is an array of query entries, capped in length. Each entry is
//! resolved and extracted on its own; misses are skipped and the results
//! of the hits keep the request order.

use crate::datastore::ModelSnapshot;
use crate::error::{CoreconfError, Result};
use crate::extract::extract;
use crate::instance_id::InstanceId;
use crate::path::resolve_path;
use crate::value::Value;

/// Result of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Extracted subtrees of the entries that resolved, in request order
    pub values: Vec<Value>,
    /// Number of entries in the request
    pub requested: usize,
    /// Hits that crossed a keyed list without key values and took its
    /// first entry
    pub positional: usize,
}

impl FetchOutcome {
    pub fn missed(&self) -> usize {
        self.requested - self.values.len()
    }

    /// The response array
    pub fn into_value(self) -> Value {
        Value::Array(self.values)
    }
}

/// Resolve every query in `request` against `snapshot`.
///
/// The whole batch is rejected when `request` is not an array, holds more
/// than `max_entries` queries or contains a malformed query. Entries whose
/// SID or keys match nothing are left out of the result.
pub fn handle_fetch(
    snapshot: &ModelSnapshot,
    request: &Value,
    max_entries: usize,
) -> Result<FetchOutcome> {
    let entries = request
        .as_array()
        .ok_or_else(|| CoreconfError::BadRequest("FETCH payload is not an array".into()))?;

    if entries.len() > max_entries {
        return Err(CoreconfError::TooManyQueries {
            count: entries.len(),
            max: max_entries,
        });
    }

    // Validate every entry before resolving any
    let queries = entries
        .iter()
        .map(InstanceId::from_value)
        .collect::<Result<Vec<_>>>()?;

    let mut values = Vec::with_capacity(queries.len());
    let mut positional = 0;
    for query in &queries {
        match resolve_ranked(snapshot, query) {
            Some((value, by_position)) => {
                values.push(value.clone());
                positional += usize::from(by_position);
            }
            None => tracing::debug!(sid = query.sid, keys = query.keys.len(), "query missed"),
        }
    }

    Ok(FetchOutcome {
        values,
        requested: queries.len(),
        positional,
    })
}

/// Resolve a single query; `None` on a lookup miss
pub fn resolve_one<'a>(snapshot: &'a ModelSnapshot, query: &InstanceId) -> Option<&'a Value> {
    resolve_ranked(snapshot, query).map(|(value, _)| value)
}

/// Like [`resolve_one`], also telling whether a list entry was picked by
/// position instead of by key
fn resolve_ranked<'a>(snapshot: &'a ModelSnapshot, query: &InstanceId) -> Option<(&'a Value, bool)> {
    let path = resolve_path(
        snapshot.index(),
        snapshot.keys(),
        query.sid,
        query.keys.as_slice(),
    )?;
    tracing::trace!(sid = query.sid, steps = path.nodes.len(), "path resolved");
    let value = extract(snapshot.model(), &path, snapshot.keys())?;
    Some((value, path.positional))
}
