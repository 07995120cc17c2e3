//! Searchbind Backend — pluggable search backends for structured records.
//!
//! This crate implements the backend abstraction: the [`SearchBackend`] and
//! [`Index`] contracts, per-backend query compilation, the lazy results
//! executor, and the rebuild orchestrator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    searchbind-backend                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SearchBackend trait                                        │
//! │  ├── LocalBackend (in-process linear-scan store)            │
//! │  └── ServiceBackend (external document-search service)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Index trait (add/delete/refresh/reset per record type)     │
//! │  SearchRequest → per-backend compiler → compiled query      │
//! │  SearchResults (lazy, sliceable, countable, re-hydrating)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Rebuilder (full reindex: shadow index + atomic alias swap) │
//! │  Transport trait (service protocol; mock and HTTP)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - `service-http`: HTTP transport for the service backend (reqwest)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use searchbind_backend::{create_backend, SearchBackend, SearchRequest};
//! use searchbind_core::BackendSettings;
//! use searchbind_query::SearchQuery;
//! use searchbind_schema::{
//!     FieldDescriptor, MemorySource, RecordInstance, RecordSource, RecordType, SchemaRegistry,
//! };
//!
//! # fn main() -> searchbind_core::Result<()> {
//! let mut schema = SchemaRegistry::new();
//! schema.register(RecordType::new("book").with_field(FieldDescriptor::search("title")))?;
//!
//! let source = Arc::new(MemorySource::new(vec![]));
//! source.insert(RecordInstance::new("book", "1").with_str("title", "Dune"));
//!
//! let backend = create_backend(
//!     BackendSettings::default(),
//!     Arc::new(schema),
//!     source.clone() as Arc<dyn RecordSource>,
//! )?;
//! backend.add(&source.resolve("book", "1").unwrap())?;
//!
//! let results = backend.search(SearchRequest::new("book", SearchQuery::plain("dune")))?;
//! assert_eq!(results.count()?, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod compiler;
pub mod document;
pub mod index;
pub mod local;
pub mod rebuild;
pub mod results;
pub mod service;

// Re-exports
pub use backend::{create_backend, BackendRegistry, SearchBackend, SearchRequest};
pub use index::{index_key, BulkOutcome, Index};
pub use local::LocalBackend;
pub use rebuild::{rebuild, RebuildStats, Rebuilder};
pub use results::{Hit, QueryExecutor, SearchResults};
pub use service::transport::{MockTransport, Transport};
pub use service::ServiceBackend;

#[cfg(feature = "service-http")]
pub use service::http::HttpTransport;
