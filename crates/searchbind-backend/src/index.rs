//! The per-record-type index contract.
//!
//! An [`Index`] is the binding between one record type and one physical
//! backend index. Handles are created on first use and live for the
//! process lifetime; `reset()` destroys and recreates the physical index,
//! `refresh()` makes pending writes visible to subsequent reads.
//!
//! Failure semantics: `add_item`/`add_items` failures are indexing errors,
//! which the owning backend may swallow per its `catch_indexing_errors`
//! setting. `refresh()` and `reset()` failures always propagate — a
//! silently partial reset would corrupt search state.

use searchbind_core::{Error, Result};
use searchbind_schema::RecordInstance;

/// Outcome of indexing one record within a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Identity key of the record.
    pub id: String,
    /// The failure message, or `None` on success.
    pub error: Option<String>,
}

impl BulkOutcome {
    /// A successful outcome.
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    /// A failed outcome.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(error.into()),
        }
    }

    /// Returns `true` if the record was indexed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One physical backend index for one record type.
///
/// Handles hold configuration only, so they are safe to use from multiple
/// concurrent callers.
pub trait Index: Send + Sync {
    /// Deterministic key identifying this index within the backend. Stable
    /// across process restarts, so repeated runs target the same physical
    /// index.
    fn key(&self) -> String;

    /// Upsert a single record by identity key. Re-adding the same key with
    /// changed field values overwrites the prior content.
    fn add_item(&self, item: &RecordInstance) -> Result<()> {
        let outcomes = self.add_items(std::slice::from_ref(item))?;
        for outcome in outcomes {
            if let Some(message) = outcome.error {
                return Err(Error::indexing(outcome.id, message));
            }
        }
        Ok(())
    }

    /// Upsert several records. One record's failure must not abort the
    /// rest of the batch; per-record outcomes report which ones failed.
    /// `Err` is reserved for whole-batch failures (transport down).
    fn add_items(&self, items: &[RecordInstance]) -> Result<Vec<BulkOutcome>>;

    /// Delete by identity key. Deleting a non-existent key is not an error.
    fn delete_item(&self, id: &str) -> Result<()>;

    /// Make all writes issued before this call visible to reads issued
    /// after it returns.
    fn refresh(&self) -> Result<()>;

    /// Destroy all content for this index and recreate it empty.
    fn reset(&self) -> Result<()>;
}

/// Derive the index key for a record type under a namespace prefix.
///
/// Pure function of its inputs: no process state, so concurrent rebuilds of
/// different record types can never collide, and repeated runs target the
/// same physical index.
pub fn index_key(prefix: &str, record_type: &str) -> String {
    format!("{}__{}", sanitize(prefix), sanitize(record_type))
}

// Index names travel in URL paths; keep them lowercase and path-safe.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
