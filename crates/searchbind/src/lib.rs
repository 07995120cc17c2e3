//! Searchbind — umbrella crate.
//!
//! Re-exports all searchbind components under one roof. Enable the
//! `service-http` feature for the HTTP transport of the service backend.

#![doc = include_str!("../README.md")]

pub use searchbind_backend as backend;
pub use searchbind_core as core;
pub use searchbind_query as query;
pub use searchbind_schema as schema;
