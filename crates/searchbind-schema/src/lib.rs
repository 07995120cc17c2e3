//! Searchbind Schema — record types, field descriptors, and the host
//! schema interface.
//!
//! A [`RecordType`] describes how one class of records is indexed: which
//! attributes are full-text searchable, which are filterable/orderable, and
//! which project related objects into the document. Record types are
//! registered once in a [`SchemaRegistry`] and are immutable for the process
//! lifetime.
//!
//! Live records reach searchbind as [`RecordInstance`] values — an identity
//! key plus a field-name → [`FieldValue`] mapping — supplied by the host
//! through the [`RecordSource`] trait.
//!
//! # Modules
//!
//! - [`field`]: Field descriptors and record type schemas
//! - [`record`]: Record instances and field values
//! - [`registry`]: The process-lifetime schema registry
//! - [`source`]: The host schema interface ([`RecordSource`], [`MemorySource`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod field;
pub mod record;
pub mod registry;
pub mod source;

pub use field::{FieldDescriptor, FieldKind, RecordType, SearchFieldRef};
pub use record::{FieldValue, RecordInstance};
pub use registry::SchemaRegistry;
pub use source::{MemorySource, RecordSource};
