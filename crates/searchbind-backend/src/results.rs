//! Lazy search results.
//!
//! A [`SearchResults`] holds a compiled query plus slice bounds and issues
//! no backend work until materialized. Every materialization (`to_vec`,
//! `count`, `first`, `exists`) re-runs the backend call, so results always
//! reflect current index state; nothing is cached. Slicing composes: the
//! bounds of `results.slice(a, b).slice(c, d)` are resolved against the
//! original query, never against an intermediate snapshot.
//!
//! Statically-empty queries (blank text, `MatchNone`, constant-false
//! filters) materialize without touching the executor at all.
//!
//! When the backend has no native ordering but an order was requested, the
//! executor fetches the full hit set and the results apply a stable
//! post-hoc sort on the resolved records before slicing.

use std::sync::Arc;

use searchbind_core::Result;
use searchbind_query::eval::compare_records;
use searchbind_schema::{RecordInstance, RecordSource};

use crate::compiler::CompiledQuery;

/// One backend match: the identity of a record plus its relevance score
/// where the backend produces one.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Name of the record type the hit belongs to.
    pub record_type: String,
    /// Identity of the matched record.
    pub id: String,
    /// Relevance score, `None` for backends that do not score.
    pub score: Option<f64>,
}

impl Hit {
    /// An unscored hit.
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
            score: None,
        }
    }

    /// A scored hit.
    pub fn scored(record_type: impl Into<String>, id: impl Into<String>, score: f64) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
            score: Some(score),
        }
    }
}

/// The execution half of a backend: run a compiled query, return hits.
///
/// `offset`/`limit` are a window into the backend's own result order. When
/// the backend lacks native ordering the caller passes the full window and
/// sorts afterwards.
pub trait QueryExecutor: Send + Sync {
    /// Run the query, returning the hits in the window.
    fn fetch(
        &self,
        query: &CompiledQuery,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Hit>>;

    /// Total number of hits for the query, ignoring any window.
    fn count(&self, query: &CompiledQuery) -> Result<usize>;
}

/// A lazy, sliceable handle on the matches of one compiled query.
#[derive(Clone)]
pub struct SearchResults {
    executor: Arc<dyn QueryExecutor>,
    source: Arc<dyn RecordSource>,
    query: CompiledQuery,
    offset: usize,
    limit: Option<usize>,
}

impl SearchResults {
    /// Wrap a compiled query with no slice bounds.
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        source: Arc<dyn RecordSource>,
        query: CompiledQuery,
    ) -> Self {
        Self {
            executor,
            source,
            query,
            offset: 0,
            limit: None,
        }
    }

    /// The compiled query behind these results.
    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    /// Current slice bounds as `(offset, limit)`.
    pub fn bounds(&self) -> (usize, Option<usize>) {
        (self.offset, self.limit)
    }

    /// Narrow the window. Bounds are relative to the current window and
    /// compose against the original query, so slicing never widens the
    /// window.
    #[must_use]
    pub fn slice(&self, offset: usize, limit: Option<usize>) -> Self {
        let remaining = self.limit.map(|l| l.saturating_sub(offset));
        let limit = match (remaining, limit) {
            (Some(r), Some(l)) => Some(r.min(l)),
            (Some(r), None) => Some(r),
            (None, l) => l,
        };
        Self {
            executor: Arc::clone(&self.executor),
            source: Arc::clone(&self.source),
            query: self.query.clone(),
            offset: self.offset + offset,
            limit,
        }
    }

    /// Number of matches inside the window. Re-issues the backend count on
    /// every call.
    pub fn count(&self) -> Result<usize> {
        if self.query.is_statically_empty() {
            return Ok(0);
        }
        let total = self.executor.count(&self.query)?;
        let available = total.saturating_sub(self.offset);
        Ok(self.limit.map_or(available, |l| available.min(l)))
    }

    /// Returns `true` when the window holds at least one match.
    pub fn exists(&self) -> Result<bool> {
        Ok(self.slice(0, Some(1)).count()? > 0)
    }

    /// The raw hits inside the window, before record resolution.
    pub fn hits(&self) -> Result<Vec<Hit>> {
        if self.query.is_statically_empty() {
            return Ok(Vec::new());
        }
        if self.needs_post_sort() {
            // Resolution happens per hit during the sort; keep the sorted
            // hit order.
            return Ok(self.sorted_resolved()?.into_iter().map(|(h, _)| h).collect());
        }
        self.executor.fetch(&self.query, self.offset, self.limit)
    }

    /// Materialize the window into resolved records, dropping hits whose
    /// record no longer exists in the source.
    pub fn to_vec(&self) -> Result<Vec<RecordInstance>> {
        if self.query.is_statically_empty() {
            return Ok(Vec::new());
        }
        if self.needs_post_sort() {
            return Ok(self
                .sorted_resolved()?
                .into_iter()
                .map(|(_, record)| record)
                .collect());
        }
        let hits = self.executor.fetch(&self.query, self.offset, self.limit)?;
        Ok(self.resolve(hits))
    }

    /// The first record in the window, if any.
    pub fn first(&self) -> Result<Option<RecordInstance>> {
        Ok(self.slice(0, Some(1)).to_vec()?.into_iter().next())
    }

    fn needs_post_sort(&self) -> bool {
        !self.query.native_ordering && !self.query.order.is_empty()
    }

    fn resolve(&self, hits: Vec<Hit>) -> Vec<RecordInstance> {
        hits.into_iter()
            .filter_map(|hit| {
                let record = self.source.resolve(&hit.record_type, &hit.id);
                if record.is_none() {
                    log::debug!(
                        "dropping stale hit {}:{} (record no longer in source)",
                        hit.record_type,
                        hit.id
                    );
                }
                record
            })
            .collect()
    }

    /// Full fetch, resolve, stable sort by the order directive, then apply
    /// the window in memory. Used when the backend cannot order natively.
    fn sorted_resolved(&self) -> Result<Vec<(Hit, RecordInstance)>> {
        let hits = self.executor.fetch(&self.query, 0, None)?;
        let mut pairs: Vec<(Hit, RecordInstance)> = hits
            .into_iter()
            .filter_map(|hit| {
                self.source
                    .resolve(&hit.record_type, &hit.id)
                    .map(|record| (hit, record))
            })
            .collect();
        pairs.sort_by(|(_, a), (_, b)| compare_records(&self.query.order, a, b));

        let iter = pairs.into_iter().skip(self.offset);
        Ok(match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        })
    }
}

impl std::fmt::Debug for SearchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchResults")
            .field("query", &self.query)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
