//! Searchbind Query — backend-agnostic filter trees and ordering.
//!
//! The query layer represents search conditions as data, not code: a
//! [`FilterNode`] tree of lookups and connectors built by the caller, walked
//! by each backend's query compiler. No backend sees the host's schema at
//! query time; all field-path resolution happens against the declared field
//! descriptor set.
//!
//! # Modules
//!
//! - [`filter`]: The filter tree ([`FilterNode`], [`LookupOperator`]) and
//!   static simplification
//! - [`order`]: Ordering directives
//! - [`search`]: Full-text query variants ([`SearchQuery`])
//! - [`eval`]: The reference in-memory evaluator, used by the local backend
//!   and as the correctness oracle in tests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod eval;
pub mod filter;
pub mod order;
pub mod search;

pub use filter::{Connector, FilterNode, LookupOperator, Operand};
pub use order::{OrderDirective, OrderEntry};
pub use search::{SearchQuery, TermOperator};
