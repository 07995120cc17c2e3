//! The in-process backend.
//!
//! [`LocalBackend`] keeps index snapshots in process memory and answers
//! queries with a linear scan over them, using the reference filter
//! evaluator. It needs no external service, supports every lookup
//! operator, and serves as the correctness oracle the service backend is
//! tested against. It declares no native ordering, so ordered queries
//! exercise the results layer's post-hoc sort.
//!
//! Writes are visible immediately; `refresh` is a no-op kept for contract
//! parity. Atomic rebuilds populate a shadow generation of the index and
//! repoint the live alias in one locked step.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use chrono::Utc;

use searchbind_core::{BackendSettings, Error, Result};
use searchbind_query::{eval, SearchQuery, TermOperator};
use searchbind_schema::{RecordInstance, RecordSource, RecordType, SchemaRegistry};

use crate::backend::SearchBackend;
use crate::compiler::{CompiledQuery, CompilerOptions};
use crate::document::search_texts;
use crate::index::{index_key, BulkOutcome, Index};
use crate::results::{Hit, QueryExecutor};

/// Concrete index generations plus the alias map pointing at the live one,
/// shared between the backend, its index handles, and its executor.
#[derive(Debug, Default)]
struct LocalStore {
    /// Concrete generation key -> id -> stored snapshot.
    generations: RwLock<BTreeMap<String, BTreeMap<String, RecordInstance>>>,
    /// Record type name -> live generation key.
    live: RwLock<BTreeMap<String, String>>,
    /// Monotonic suffix for shadow generation keys.
    rebuild_seq: AtomicU64,
}

impl LocalStore {
    fn live_key(&self, record_type: &str, default: &str) -> String {
        let mut live = self.live.write().expect("index alias lock poisoned");
        live.entry(record_type.to_string())
            .or_insert_with(|| default.to_string())
            .clone()
    }

    fn ensure_generation(&self, key: &str) {
        self.generations
            .write()
            .expect("index store lock poisoned")
            .entry(key.to_string())
            .or_default();
    }
}

/// In-process linear-scan backend.
pub struct LocalBackend {
    settings: BackendSettings,
    registry: Arc<SchemaRegistry>,
    source: Arc<dyn RecordSource>,
    executor: Arc<LocalExecutor>,
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LocalBackend {
    /// Build a local backend over the given schema and source.
    pub fn new(
        settings: BackendSettings,
        registry: Arc<SchemaRegistry>,
        source: Arc<dyn RecordSource>,
    ) -> Self {
        Self {
            settings,
            registry,
            source,
            executor: Arc::new(LocalExecutor {
                store: Arc::new(LocalStore::default()),
            }),
        }
    }

    fn store(&self) -> &Arc<LocalStore> {
        &self.executor.store
    }

    fn alias(&self, record_type: &str) -> String {
        index_key(&self.settings.index_prefix, record_type)
    }

    fn handle(&self, record_type: &RecordType, key: String) -> LocalIndex {
        self.store().ensure_generation(&key);
        LocalIndex {
            key,
            record_type: record_type.clone(),
            store: Arc::clone(self.store()),
        }
    }
}

impl SearchBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn source(&self) -> Arc<dyn RecordSource> {
        Arc::clone(&self.source)
    }

    fn compiler_options(&self) -> CompilerOptions {
        CompilerOptions {
            unsupported_operators: &[],
            native_ordering: false,
        }
    }

    fn executor(&self) -> Arc<dyn QueryExecutor> {
        self.executor.clone()
    }

    fn index_for(&self, record_type: &str) -> Result<Box<dyn Index>> {
        let record_type = self.resolve_type(record_type)?;
        let key = self.store().live_key(&record_type.name, &self.alias(&record_type.name));
        Ok(Box::new(self.handle(&record_type, key)))
    }

    fn begin_rebuild(&self, record_type: &str) -> Result<Box<dyn Index>> {
        let record_type = self.resolve_type(record_type)?;
        if !self.settings.atomic_rebuild {
            let index = self.index_for(&record_type.name)?;
            index.reset()?;
            return Ok(index);
        }
        let seq = self.store().rebuild_seq.fetch_add(1, AtomicOrdering::SeqCst);
        let key = format!(
            "{}__rb_{}_{seq}",
            self.alias(&record_type.name),
            Utc::now().format("%Y%m%d%H%M%S"),
        );
        Ok(Box::new(self.handle(&record_type, key)))
    }

    fn finish_rebuild(&self, record_type: &str, rebuilt_key: &str) -> Result<()> {
        let record_type = self.resolve_type(record_type)?;
        let store = self.store();
        // Take both locks so readers never observe the alias pointing at a
        // dropped generation.
        let mut live = store.live.write().expect("index alias lock poisoned");
        let mut generations = store.generations.write().expect("index store lock poisoned");
        if !generations.contains_key(rebuilt_key) {
            return Err(Error::configuration(format!(
                "unknown rebuilt index '{rebuilt_key}'"
            )));
        }
        let previous = live.insert(record_type.name.clone(), rebuilt_key.to_string());
        if let Some(previous) = previous {
            if previous != rebuilt_key {
                generations.remove(&previous);
                log::info!("retired index generation '{previous}' for '{}'", record_type.name);
            }
        }
        Ok(())
    }

    fn abort_rebuild(&self, record_type: &str, rebuilt_key: &str) -> Result<()> {
        let record_type = self.resolve_type(record_type)?;
        let store = self.store();
        let live = store.live.read().expect("index alias lock poisoned");
        if live.get(&record_type.name).is_some_and(|key| key == rebuilt_key) {
            // Non-atomic rebuilds populate the live index in place.
            return Ok(());
        }
        drop(live);
        store
            .generations
            .write()
            .expect("index store lock poisoned")
            .remove(rebuilt_key);
        log::info!("dropped abandoned index generation '{rebuilt_key}'");
        Ok(())
    }
}

/// Index handle bound to one concrete generation. A handle taken before an
/// alias swap keeps writing to its own generation, which is what the
/// rebuilder relies on.
struct LocalIndex {
    key: String,
    record_type: RecordType,
    store: Arc<LocalStore>,
}

impl Index for LocalIndex {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn add_items(&self, instances: &[RecordInstance]) -> Result<Vec<BulkOutcome>> {
        let mut outcomes = Vec::with_capacity(instances.len());
        let mut generations = self
            .store
            .generations
            .write()
            .expect("index store lock poisoned");
        let index = generations.entry(self.key.clone()).or_default();

        for instance in instances {
            // Validate up front so a bad record never lands in the index.
            match search_texts(&self.record_type, instance, None, false) {
                Ok(_) => {
                    index.insert(instance.id.clone(), instance.clone());
                    outcomes.push(BulkOutcome::ok(&instance.id));
                }
                Err(err) => outcomes.push(BulkOutcome::failed(&instance.id, err.to_string())),
            }
        }
        Ok(outcomes)
    }

    fn delete_item(&self, id: &str) -> Result<()> {
        let mut generations = self
            .store
            .generations
            .write()
            .expect("index store lock poisoned");
        if let Some(index) = generations.get_mut(&self.key) {
            index.remove(id);
        }
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        // Writes are visible immediately.
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.store
            .generations
            .write()
            .expect("index store lock poisoned")
            .insert(self.key.clone(), BTreeMap::new());
        Ok(())
    }
}

/// Linear-scan executor over the live generation of a record type's index.
struct LocalExecutor {
    store: Arc<LocalStore>,
}

impl LocalExecutor {
    /// All matching hits, in native order: relevance (then id) for text
    /// queries, id order otherwise.
    fn scan(&self, query: &CompiledQuery) -> Result<Vec<Hit>> {
        let live = self.store.live.read().expect("index alias lock poisoned");
        let Some(key) = live.get(&query.record_type.name) else {
            return Ok(Vec::new());
        };
        let generations = self
            .store
            .generations
            .read()
            .expect("index store lock poisoned");
        let Some(index) = generations.get(key) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for (id, instance) in index {
            if !eval::matches(&query.filter, instance) {
                continue;
            }
            let Some(score) = score_text(query, instance)? else {
                continue;
            };
            hits.push(Hit {
                record_type: query.record_type.name.clone(),
                id: id.clone(),
                score,
            });
        }

        if !matches!(query.query, SearchQuery::MatchAll) {
            hits.sort_by(|a, b| {
                b.score
                    .unwrap_or(0.0)
                    .total_cmp(&a.score.unwrap_or(0.0))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        Ok(hits)
    }
}

/// Score an instance against the text half of the query. `None` means no
/// match; `Some(None)` is an unscored `MatchAll` hit.
fn score_text(query: &CompiledQuery, instance: &RecordInstance) -> Result<Option<Option<f64>>> {
    let terms = query.query.terms();
    let (prefix, operator) = match &query.query {
        SearchQuery::MatchAll => return Ok(Some(None)),
        // Statically-empty queries are short-circuited before execution.
        SearchQuery::MatchNone => return Ok(None),
        SearchQuery::PlainText { operator, .. } => (false, *operator),
        SearchQuery::Prefix { .. } => (true, TermOperator::And),
    };

    let texts = search_texts(
        &query.record_type,
        instance,
        query.fields.as_deref(),
        prefix,
    )?;
    let mut score = 0.0_f64;
    let mut matched_terms = 0_usize;

    for term in &terms {
        let mut term_score = 0.0_f64;
        for (field, text) in &texts {
            let occurrences = text
                .split_whitespace()
                .filter(|word| {
                    let word = word.to_lowercase();
                    if prefix {
                        word.starts_with(term.as_str())
                    } else {
                        word == *term
                    }
                })
                .count();
            term_score += occurrences as f64 * f64::from(field.weight);
        }
        if term_score > 0.0 {
            matched_terms += 1;
            score += term_score;
        }
    }

    let matched = match operator {
        TermOperator::And => matched_terms == terms.len(),
        TermOperator::Or => matched_terms > 0,
    };
    Ok(matched.then_some(Some(score)))
}

impl QueryExecutor for LocalExecutor {
    fn fetch(&self, query: &CompiledQuery, offset: usize, limit: Option<usize>) -> Result<Vec<Hit>> {
        let iter = self.scan(query)?.into_iter().skip(offset);
        Ok(match limit {
            Some(l) => iter.take(l).collect(),
            None => iter.collect(),
        })
    }

    fn count(&self, query: &CompiledQuery) -> Result<usize> {
        Ok(self.scan(query)?.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
