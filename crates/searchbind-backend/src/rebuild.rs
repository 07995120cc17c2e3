//! Full reindexing.
//!
//! The [`Rebuilder`] streams every record of every registered type from
//! the [`RecordSource`](searchbind_schema::RecordSource) into a fresh
//! index generation, in batches, then asks the backend to make the new
//! generation live. With `atomic_rebuild` (the default) the live index
//! keeps serving until the single switch at the end; readers never see a
//! half-built index. Without it the live index is reset in place and
//! searches run against a partially-built index until the rebuild
//! completes.
//!
//! Per-record indexing failures follow `catch_indexing_errors`: counted
//! and logged by default, fatal when the setting is off. Whole-batch and
//! activation failures are always fatal and carry the record type and
//! batch offset they occurred at.

use searchbind_core::{Error, Result};
use searchbind_schema::RecordInstance;

use crate::backend::SearchBackend;
use crate::index::Index;

/// Records per bulk request during the populate phase.
const DEFAULT_BATCH_SIZE: usize = 1000;

/// What a rebuild did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Record types rebuilt.
    pub record_types: usize,
    /// Records successfully indexed.
    pub indexed: usize,
    /// Records that failed to index and were skipped.
    pub skipped: usize,
}

impl RebuildStats {
    fn merge(&mut self, other: RebuildStats) {
        self.record_types += other.record_types;
        self.indexed += other.indexed;
        self.skipped += other.skipped;
    }
}

/// Orchestrates full reindexes against one backend.
pub struct Rebuilder<'a> {
    backend: &'a dyn SearchBackend,
    batch_size: usize,
}

impl<'a> Rebuilder<'a> {
    /// A rebuilder with the default batch size.
    pub fn new(backend: &'a dyn SearchBackend) -> Self {
        Self {
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the number of records per bulk request.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rebuild every registered record type.
    pub fn rebuild_all(&self) -> Result<RebuildStats> {
        let names: Vec<String> = self
            .backend
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut stats = RebuildStats::default();
        for name in names {
            stats.merge(self.rebuild_type(&name)?);
        }
        Ok(stats)
    }

    /// Rebuild one record type.
    pub fn rebuild_type(&self, record_type: &str) -> Result<RebuildStats> {
        let record_type = self.backend.resolve_type(record_type)?.name;
        log::info!("rebuilding index for '{record_type}'");

        let index = self.backend.begin_rebuild(&record_type)?;
        let (indexed, skipped) = match self.populate(&record_type, index.as_ref()).and_then(
            |(indexed, skipped)| {
                index
                    .refresh()
                    .map(|()| (indexed, skipped))
                    .map_err(|err| Error::rebuild(&record_type, indexed + skipped, err))
            },
        ) {
            Ok(counts) => counts,
            Err(err) => {
                self.abort(&record_type, &index.key());
                return Err(err);
            }
        };

        self.backend
            .finish_rebuild(&record_type, &index.key())
            .map_err(|err| Error::rebuild(&record_type, indexed + skipped, err))?;

        log::info!("rebuilt '{record_type}': {indexed} indexed, {skipped} skipped");
        Ok(RebuildStats {
            record_types: 1,
            indexed,
            skipped,
        })
    }

    /// Best-effort cleanup of an abandoned rebuild target. The rebuild
    /// already failed; a cleanup failure only leaks an index.
    fn abort(&self, record_type: &str, rebuilt_key: &str) {
        if let Err(err) = self.backend.abort_rebuild(record_type, rebuilt_key) {
            log::warn!("failed to clean up abandoned index '{rebuilt_key}': {err}");
        }
    }

    /// Stream the source into the target index. Returns
    /// `(indexed, skipped)`.
    fn populate(&self, record_type: &str, index: &dyn Index) -> Result<(usize, usize)> {
        let catch_errors = self.backend.settings().catch_indexing_errors;
        let source = self.backend.source();
        let mut records = source.fetch_all(record_type)?;
        let mut indexed = 0_usize;
        let mut skipped = 0_usize;

        loop {
            let offset = indexed + skipped;
            let batch: Vec<RecordInstance> = records.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let outcomes = index
                .add_items(&batch)
                .map_err(|err| Error::rebuild(record_type, offset, err))?;
            for outcome in outcomes {
                match outcome.error {
                    None => indexed += 1,
                    Some(message) => {
                        let err = Error::indexing(&outcome.id, message);
                        if !catch_errors {
                            return Err(Error::rebuild(record_type, offset, err));
                        }
                        log::warn!("skipping {record_type}:{}: {err}", outcome.id);
                        skipped += 1;
                    }
                }
            }
        }
        Ok((indexed, skipped))
    }
}

/// Rebuild every record type on a backend with default settings.
pub fn rebuild(backend: &dyn SearchBackend) -> Result<RebuildStats> {
    Rebuilder::new(backend).rebuild_all()
}

// ============================================================================
// Tests
// ============================================================================
