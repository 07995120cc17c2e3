//! The external document-service backend.
//!
//! [`ServiceBackend`] talks to an Elasticsearch-style document service
//! through a [`Transport`]. Queries are compiled to the JSON search DSL
//! (see [`dsl`]); every register-level concept maps to a service one:
//!
//! - each record type gets one concrete index, addressed through an alias
//!   so atomic rebuilds are a single alias repoint
//! - record instances ship as projected JSON documents
//! - ordering is native (`sort` in the request body)
//!
//! The service DSL has no rendering for `iexact`, `contains`, `icontains`
//! or `endswith`; requests using them fail compilation rather than
//! degrade.

pub mod dsl;
pub mod transport;

#[cfg(feature = "service-http")]
pub mod http;

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use searchbind_core::{BackendSettings, Error, Result};
use searchbind_schema::{RecordInstance, RecordSource, RecordType, SchemaRegistry};

use crate::backend::SearchBackend;
use crate::compiler::{CompiledQuery, CompilerOptions};
use crate::document::build_document;
use crate::index::{index_key, BulkOutcome, Index};
use crate::results::{Hit, QueryExecutor};

use self::transport::Transport;

/// Default index settings sent on index creation; merged under any
/// configured `index_settings` overrides.
const DEFAULT_INDEX_SETTINGS: &str = r#"{
    "number_of_shards": 1,
    "analysis": {
        "analyzer": {
            "default": { "type": "standard" }
        }
    }
}"#;

/// Backend over an external document-search service.
pub struct ServiceBackend {
    settings: BackendSettings,
    registry: Arc<SchemaRegistry>,
    source: Arc<dyn RecordSource>,
    transport: Arc<dyn Transport>,
    executor: Arc<ServiceExecutor>,
    rebuild_seq: AtomicU64,
}

impl std::fmt::Debug for ServiceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ServiceBackend {
    /// Build a service backend over an explicit transport. Use
    /// [`create_backend`](crate::create_backend) with the `service-http`
    /// feature for the HTTP transport.
    pub fn new(
        settings: BackendSettings,
        registry: Arc<SchemaRegistry>,
        source: Arc<dyn RecordSource>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if settings.index_prefix.trim().is_empty() {
            return Err(Error::configuration_field(
                "service backend requires a non-empty index_prefix",
                "index_prefix",
            ));
        }
        let executor = Arc::new(ServiceExecutor {
            transport: Arc::clone(&transport),
            index_prefix: settings.index_prefix.clone(),
        });
        Ok(Self {
            settings,
            registry,
            source,
            transport,
            executor,
            rebuild_seq: AtomicU64::new(0),
        })
    }

    fn alias(&self, record_type: &str) -> String {
        index_key(&self.settings.index_prefix, record_type)
    }

    fn creation_body(&self, record_type: &RecordType) -> Result<Value> {
        let defaults: Value = serde_json::from_str(DEFAULT_INDEX_SETTINGS)?;
        Ok(json!({
            "settings": self.settings.resolved_index_settings(&defaults),
            "mappings": dsl::mapping(record_type),
        }))
    }

    /// The concrete index the alias points at, creating the initial
    /// generation on first use.
    fn live_key(&self, record_type: &RecordType) -> Result<String> {
        let alias = self.alias(&record_type.name);
        if let Some(key) = self.transport.indexes_for_alias(&alias)?.into_iter().next() {
            return Ok(key);
        }
        let key = format!("{alias}__g0");
        self.transport.create_index(&key, &self.creation_body(record_type)?)?;
        self.transport.update_alias(&alias, &key, &[])?;
        log::info!("created index '{key}' behind alias '{alias}'");
        Ok(key)
    }

    fn handle(&self, record_type: &RecordType, key: String) -> Result<ServiceIndex> {
        Ok(ServiceIndex {
            key,
            record_type: record_type.clone(),
            transport: Arc::clone(&self.transport),
            creation_body: self.creation_body(record_type)?,
        })
    }
}

impl SearchBackend for ServiceBackend {
    fn name(&self) -> &'static str {
        "service"
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
            unsupported_operators: dsl::UNSUPPORTED_LOOKUPS,
            native_ordering: true,
        }
    }

    fn executor(&self) -> Arc<dyn QueryExecutor> {
        self.executor.clone()
    }

    fn index_for(&self, record_type: &str) -> Result<Box<dyn Index>> {
        let record_type = self.resolve_type(record_type)?;
        let key = self.live_key(&record_type)?;
        Ok(Box::new(self.handle(&record_type, key)?))
    }

    fn begin_rebuild(&self, record_type: &str) -> Result<Box<dyn Index>> {
        let record_type = self.resolve_type(record_type)?;
        if !self.settings.atomic_rebuild {
            let index = self.index_for(&record_type.name)?;
            index.reset()?;
            return Ok(index);
        }
        let seq = self.rebuild_seq.fetch_add(1, AtomicOrdering::SeqCst);
        let key = format!(
            "{}__rb_{}_{seq}",
            self.alias(&record_type.name),
            Utc::now().format("%Y%m%d%H%M%S"),
        );
        self.transport.create_index(&key, &self.creation_body(&record_type)?)?;
        log::info!("created shadow index '{key}' for rebuild of '{}'", record_type.name);
        Ok(Box::new(self.handle(&record_type, key)?))
    }

    fn finish_rebuild(&self, record_type: &str, rebuilt_key: &str) -> Result<()> {
        let record_type = self.resolve_type(record_type)?;
        let alias = self.alias(&record_type.name);
        let retired: Vec<String> = self
            .transport
            .indexes_for_alias(&alias)?
            .into_iter()
            .filter(|key| key != rebuilt_key)
            .collect();

        // The swap itself is one alias operation; readers see either the
        // old generation or the new one.
        self.transport.update_alias(&alias, rebuilt_key, &retired)?;
        log::info!("alias '{alias}' now points at '{rebuilt_key}'");

        // The swap already happened; a failed cleanup only leaks a
        // generation.
        for key in retired {
            if let Err(err) = self.transport.delete_index(&key) {
                log::warn!("failed to delete retired index '{key}': {err}");
            }
        }
        Ok(())
    }

    fn abort_rebuild(&self, record_type: &str, rebuilt_key: &str) -> Result<()> {
        let record_type = self.resolve_type(record_type)?;
        let alias = self.alias(&record_type.name);
        if self
            .transport
            .indexes_for_alias(&alias)?
            .iter()
            .any(|key| key == rebuilt_key)
        {
            // The alias already serves this index; dropping it would take
            // the record type offline.
            return Ok(());
        }
        self.transport.delete_index(rebuilt_key)?;
        log::info!("dropped abandoned index '{rebuilt_key}'");
        Ok(())
    }
}

/// Index handle bound to one concrete service index.
struct ServiceIndex {
    key: String,
    record_type: RecordType,
    transport: Arc<dyn Transport>,
    creation_body: Value,
}

impl Index for ServiceIndex {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn add_items(&self, instances: &[RecordInstance]) -> Result<Vec<BulkOutcome>> {
        // Project locally first so a bad record costs no request; slots for
        // failed projections are spliced back into the outcome order.
        let mut outcomes: Vec<Option<BulkOutcome>> = Vec::with_capacity(instances.len());
        let mut docs = Vec::new();
        for instance in instances {
            match build_document(&self.record_type, instance) {
                Ok(doc) => {
                    docs.push((instance.id.clone(), doc));
                    outcomes.push(None);
                }
                Err(err) => outcomes.push(Some(BulkOutcome::failed(&instance.id, err.to_string()))),
            }
        }

        let sent = if docs.is_empty() {
            Vec::new()
        } else {
            self.transport.index_documents(&self.key, &docs)?
        };
        let mut sent = sent.into_iter();

        outcomes
            .into_iter()
            .map(|slot| match slot {
                Some(failed) => Ok(failed),
                None => sent
                    .next()
                    .ok_or_else(|| Error::transport("bulk response shorter than request")),
            })
            .collect()
    }

    fn delete_item(&self, id: &str) -> Result<()> {
        self.transport.delete_document(&self.key, id)
    }

    fn refresh(&self) -> Result<()> {
        self.transport.refresh_index(&self.key)
    }

    fn reset(&self) -> Result<()> {
        self.transport.delete_index(&self.key)?;
        self.transport.create_index(&self.key, &self.creation_body)
    }
}

/// Executor that renders compiled queries to the DSL and parses the
/// service's hit envelope.
struct ServiceExecutor {
    transport: Arc<dyn Transport>,
    index_prefix: String,
}

impl ServiceExecutor {
    fn alias(&self, query: &CompiledQuery) -> String {
        index_key(&self.index_prefix, &query.record_type.name)
    }
}

impl QueryExecutor for ServiceExecutor {
    fn fetch(&self, query: &CompiledQuery, offset: usize, limit: Option<usize>) -> Result<Vec<Hit>> {
        let body = dsl::search_body(query, offset, limit)?;
        let response = self.transport.search(&self.alias(query), &body)?;

        let hits = response
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::transport("malformed search response: missing hits"))?;
        hits.iter()
            .map(|hit| {
                let id = hit
                    .get("_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::transport("malformed search response: hit without _id"))?;
                Ok(Hit {
                    record_type: query.record_type.name.clone(),
                    id: id.to_string(),
                    score: hit.get("_score").and_then(Value::as_f64),
                })
            })
            .collect()
    }

    fn count(&self, query: &CompiledQuery) -> Result<usize> {
        let body = dsl::count_body(query)?;
        Ok(self.transport.count(&self.alias(query), &body)? as usize)
    }
}

// ============================================================================
// Tests
// ============================================================================
