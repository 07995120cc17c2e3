//! The backend contract and backend selection.
//!
//! A [`SearchBackend`] ties the pieces together for one target engine:
//! schema registry, record source, per-type indexes, a query compiler
//! capability declaration, and an executor. The trait carries provided
//! methods for the whole public search surface (`search`, `add`, `remove`,
//! `refresh`, `reset`), so a concrete backend only supplies its engine
//! specifics.
//!
//! [`create_backend`] builds a backend from [`BackendSettings`], and
//! [`BackendRegistry`] holds the configured backends of a process and
//! fans incremental updates out to the ones with `auto_update` enabled.

use std::collections::BTreeMap;
use std::sync::Arc;

use searchbind_core::{BackendSettings, Error, Result};
use searchbind_query::{FilterNode, OrderDirective, SearchQuery};
use searchbind_schema::{RecordInstance, RecordSource, RecordType, SchemaRegistry};

use crate::compiler::{compile, CompiledQuery, CompilerOptions};
use crate::index::{BulkOutcome, Index};
use crate::local::LocalBackend;
use crate::results::{QueryExecutor, SearchResults};

/// The name backends are looked up under when none is specified.
pub const DEFAULT_BACKEND: &str = "default";

/// One search request: the record type to search, the full-text query, and
/// the optional structured parts.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Name of the record type (or a registered subtype) to search.
    pub record_type: String,
    /// The full-text half of the request.
    pub query: SearchQuery,
    /// The structured half. Defaults to [`FilterNode::MatchAll`].
    pub filter: FilterNode,
    /// Restrict matching to these search fields. `None` means all.
    pub fields: Option<Vec<String>>,
    /// Requested result order. Empty means backend-native order.
    pub order: OrderDirective,
}

impl SearchRequest {
    /// A request over all search fields with no filter and native order.
    pub fn new(record_type: impl Into<String>, query: SearchQuery) -> Self {
        Self {
            record_type: record_type.into(),
            query,
            filter: FilterNode::MatchAll,
            fields: None,
            order: OrderDirective::new(),
        }
    }

    /// AND a filter condition onto the request.
    #[must_use]
    pub fn filter(mut self, node: FilterNode) -> Self {
        self.filter = match self.filter {
            FilterNode::MatchAll => node,
            existing => FilterNode::and(vec![existing, node]),
        };
        self
    }

    /// Restrict matching to the named search fields.
    #[must_use]
    pub fn restrict_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Set the result order.
    #[must_use]
    pub fn order(mut self, order: OrderDirective) -> Self {
        self.order = order;
        self
    }
}

/// One configured search backend.
///
/// Concrete backends implement the engine-specific methods; the search,
/// update, and maintenance surface is provided on top of them and behaves
/// identically across backends.
pub trait SearchBackend: std::fmt::Debug + Send + Sync {
    /// Identifier of the backend kind, e.g. `"local"`.
    fn name(&self) -> &'static str;

    /// The settings this backend was built with.
    fn settings(&self) -> &BackendSettings;

    /// The schema registry this backend serves.
    fn registry(&self) -> &SchemaRegistry;

    /// The record source hits are resolved against.
    fn source(&self) -> Arc<dyn RecordSource>;

    /// What this backend's compiler accepts.
    fn compiler_options(&self) -> CompilerOptions;

    /// The executor lazy results re-issue their calls through.
    fn executor(&self) -> Arc<dyn QueryExecutor>;

    /// The live index for one registered record type.
    fn index_for(&self, record_type: &str) -> Result<Box<dyn Index>>;

    /// Start a full rebuild for one record type: returns the index the
    /// rebuilder populates. With `atomic_rebuild` enabled this is a fresh
    /// shadow index and the live one keeps serving; otherwise it is the
    /// live index after a reset.
    fn begin_rebuild(&self, record_type: &str) -> Result<Box<dyn Index>>;

    /// Make a finished rebuild live. `rebuilt_key` is the key of the index
    /// returned by [`SearchBackend::begin_rebuild`]. Must be a single
    /// atomic switch; readers see either the old index or the new one,
    /// never a mixture.
    fn finish_rebuild(&self, record_type: &str, rebuilt_key: &str) -> Result<()>;

    /// Discard an unfinished rebuild target, leaving the live index
    /// untouched. Dropping the live index itself is a no-op, so aborting
    /// a non-atomic rebuild keeps whatever was populated so far.
    fn abort_rebuild(&self, record_type: &str, rebuilt_key: &str) -> Result<()>;

    /// Resolve a record type name to the registered type that owns the
    /// index, walking subtype links to the indexed ancestor.
    fn resolve_type(&self, name: &str) -> Result<RecordType> {
        self.registry()
            .indexed_ancestor(name)
            .cloned()
            .ok_or_else(|| {
                Error::configuration(format!("record type '{name}' is not registered for search"))
            })
    }

    /// The index an instance belongs in, resolving subtypes to their
    /// indexed ancestor.
    fn index_for_instance(&self, instance: &RecordInstance) -> Result<Box<dyn Index>> {
        let record_type = self.resolve_type(&instance.record_type)?;
        self.index_for(&record_type.name)
    }

    /// One index handle per registered record type.
    fn all_indexes(&self) -> Result<Vec<Box<dyn Index>>> {
        self.registry()
            .names()
            .into_iter()
            .map(|name| self.index_for(name))
            .collect()
    }

    /// Compile and wrap a search. No backend work happens until the
    /// returned results are materialized.
    ///
    /// A record type this backend does not index matches nothing rather
    /// than erroring, so hosts can search mixed collections without
    /// pre-filtering them.
    fn search(&self, request: SearchRequest) -> Result<SearchResults> {
        let Ok(record_type) = self.resolve_type(&request.record_type) else {
            return Ok(SearchResults::new(
                self.executor(),
                self.source(),
                CompiledQuery::empty(&request.record_type),
            ));
        };
        let compiled = compile(&record_type, &request, &self.compiler_options())?;
        Ok(SearchResults::new(self.executor(), self.source(), compiled))
    }

    /// Prefix (autocomplete) search over the record type's
    /// autocomplete-flagged fields.
    fn autocomplete(&self, record_type: &str, text: &str) -> Result<SearchResults> {
        self.search(SearchRequest::new(record_type, SearchQuery::prefix(text)))
    }

    /// Index one record, replacing any previous entry with the same id.
    ///
    /// Per-record indexing failures are swallowed with a warning when
    /// `catch_indexing_errors` is set (the default); all other errors
    /// propagate.
    fn add(&self, instance: &RecordInstance) -> Result<()> {
        let record_type = self.resolve_type(&instance.record_type)?;
        let result = self.index_for(&record_type.name)?.add_item(instance);
        match result {
            Err(err) if err.is_indexing() && self.settings().catch_indexing_errors => {
                log::warn!("failed to index {}:{}: {err}", instance.record_type, instance.id);
                Ok(())
            }
            other => other,
        }
    }

    /// Index a batch of records of one type, reporting per-record outcomes
    /// instead of failing the batch.
    fn add_bulk(&self, record_type: &str, instances: &[RecordInstance]) -> Result<Vec<BulkOutcome>> {
        let record_type = self.resolve_type(record_type)?;
        self.index_for(&record_type.name)?.add_items(instances)
    }

    /// Remove one record from its index. Removing an unindexed record is a
    /// no-op.
    fn remove(&self, record_type: &str, id: &str) -> Result<()> {
        let record_type = self.resolve_type(record_type)?;
        self.index_for(&record_type.name)?.delete_item(id)
    }

    /// Make all pending writes visible to search. Failures always
    /// propagate.
    fn refresh(&self) -> Result<()> {
        for index in self.all_indexes()? {
            index.refresh()?;
        }
        Ok(())
    }

    /// Drop and recreate every index, losing all indexed data. Failures
    /// always propagate.
    fn reset(&self) -> Result<()> {
        for index in self.all_indexes()? {
            index.reset()?;
        }
        Ok(())
    }
}

/// Build a backend from settings.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an unknown backend name or for a
/// service backend without the required settings.
pub fn create_backend(
    settings: BackendSettings,
    registry: Arc<SchemaRegistry>,
    source: Arc<dyn RecordSource>,
) -> Result<Arc<dyn SearchBackend>> {
    match settings.backend.as_str() {
        "local" => Ok(Arc::new(LocalBackend::new(settings, registry, source))),
        #[cfg(feature = "service-http")]
        "service" => {
            let url = settings.url.clone().ok_or_else(|| {
                Error::configuration_field("service backend requires a url", "url")
            })?;
            let transport = crate::service::http::HttpTransport::new(&url, settings.timeout())?;
            Ok(Arc::new(crate::service::ServiceBackend::new(
                settings,
                registry,
                source,
                Arc::new(transport),
            )?))
        }
        #[cfg(not(feature = "service-http"))]
        "service" => Err(Error::configuration_field(
            "service backend requires the 'service-http' feature (or construct \
             ServiceBackend with a custom transport)",
            "backend",
        )),
        other => Err(Error::configuration_field(
            format!("unknown search backend '{other}'"),
            "backend",
        )),
    }
}

/// The configured backends of a process, keyed by name.
///
/// Incremental updates go through [`BackendRegistry::dispatch_add`] and
/// [`BackendRegistry::dispatch_remove`], which fan out to every backend
/// with `auto_update` enabled.
#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn SearchBackend>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under a name, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, backend: Arc<dyn SearchBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SearchBackend>> {
        self.backends.get(name).cloned().ok_or_else(|| {
            Error::configuration(format!("no search backend configured under '{name}'"))
        })
    }

    /// The backend registered under [`DEFAULT_BACKEND`].
    pub fn default_backend(&self) -> Result<Arc<dyn SearchBackend>> {
        self.get(DEFAULT_BACKEND)
    }

    /// Names of all registered backends.
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// The backends that receive incremental updates.
    pub fn auto_update_backends(&self) -> Vec<Arc<dyn SearchBackend>> {
        self.backends
            .values()
            .filter(|b| b.settings().auto_update)
            .cloned()
            .collect()
    }

    /// Index a changed record on every auto-update backend.
    pub fn dispatch_add(&self, instance: &RecordInstance) -> Result<()> {
        for backend in self.auto_update_backends() {
            backend.add(instance)?;
        }
        Ok(())
    }

    /// Remove a deleted record from every auto-update backend.
    pub fn dispatch_remove(&self, record_type: &str, id: &str) -> Result<()> {
        for backend in self.auto_update_backends() {
            backend.remove(record_type, id)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use searchbind_schema::{FieldDescriptor, MemorySource};

    fn fixture() -> (Arc<SchemaRegistry>, Arc<MemorySource>) {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                RecordType::new("book")
                    .with_field(FieldDescriptor::search("title"))
                    .with_field(FieldDescriptor::filter("year")),
            )
            .unwrap();
        registry.register_subtype("novel", "book");
        let source = Arc::new(MemorySource::new(vec![]));
        (Arc::new(registry), source)
    }

    fn local_settings() -> BackendSettings {
        BackendSettings::default()
    }

    #[test]
    fn test_create_local_backend() {
        let (registry, source) = fixture();
        let backend = create_backend(local_settings(), registry, source).unwrap();
        assert_eq!(backend.name(), "local");
    }

    #[test]
    fn test_create_unknown_backend_rejected() {
        let (registry, source) = fixture();
        let settings = BackendSettings {
            backend: "quantum".into(),
            ..BackendSettings::default()
        };
        let err = create_backend(settings, registry, source).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.field(), Some("backend"));
    }

    #[test]
    fn test_search_unregistered_type_matches_nothing() {
        let (registry, source) = fixture();
        let backend = create_backend(local_settings(), registry, source).unwrap();
        let results = backend
            .search(SearchRequest::new("magazine", SearchQuery::MatchAll))
            .unwrap();
        assert_eq!(results.count().unwrap(), 0);

        // Indexing an unregistered type is still a configuration error.
        let orphan = RecordInstance::new("magazine", "1");
        assert!(backend.add(&orphan).unwrap_err().is_configuration());
    }

    #[test]
    fn test_subtype_searches_ancestor_index() {
        let (registry, source) = fixture();
        source.insert(
            RecordInstance::new("novel", "1")
                .with_str("title", "Dune")
                .with_int("year", 1965),
        );
        let backend = create_backend(local_settings(), registry, source.clone()).unwrap();
        backend.add(&source.resolve("novel", "1").unwrap()).unwrap();

        let results = backend
            .search(SearchRequest::new("novel", SearchQuery::plain("dune")))
            .unwrap();
        assert_eq!(results.count().unwrap(), 1);
    }

    #[test]
    fn test_request_filter_accumulates() {
        let request = SearchRequest::new("book", SearchQuery::MatchAll)
            .filter(FilterNode::gte("year", searchbind_schema::FieldValue::Int(1950)))
            .filter(FilterNode::lt("year", searchbind_schema::FieldValue::Int(1990)));
        match request.filter {
            FilterNode::Combine { children, .. } => assert_eq!(children.len(), 2),
            other => panic!("expected a conjunction, got {other:?}"),
        }
    }

    #[test]
    fn test_registry_dispatch_respects_auto_update() {
        let (registry, source) = fixture();
        source.insert(RecordInstance::new("book", "1").with_str("title", "Dune"));

        let live = create_backend(local_settings(), registry.clone(), source.clone()).unwrap();
        let paused_settings = BackendSettings {
            auto_update: false,
            ..BackendSettings::default()
        };
        let paused = create_backend(paused_settings, registry, source.clone()).unwrap();

        let mut backends = BackendRegistry::new();
        backends.insert(DEFAULT_BACKEND, live.clone());
        backends.insert("paused", paused.clone());
        assert_eq!(backends.auto_update_backends().len(), 1);

        backends.dispatch_add(&source.resolve("book", "1").unwrap()).unwrap();
        let query = SearchRequest::new("book", SearchQuery::plain("dune"));
        assert_eq!(live.search(query.clone()).unwrap().count().unwrap(), 1);
        assert_eq!(paused.search(query).unwrap().count().unwrap(), 0);
    }

    #[test]
    fn test_default_backend_lookup() {
        let (registry, source) = fixture();
        let backend = create_backend(local_settings(), registry, source).unwrap();
        let mut backends = BackendRegistry::new();
        assert!(backends.default_backend().is_err());
        backends.insert(DEFAULT_BACKEND, backend);
        assert!(backends.default_backend().is_ok());
    }
}
