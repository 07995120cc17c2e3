//! Searchbind Core — shared error types and backend configuration.
//!
//! This crate provides the foundational types used across all searchbind
//! crates. It has no internal searchbind dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: The error taxonomy and `Result` alias
//! - [`config`]: Per-backend configuration and settings merging

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;

// Re-export key types at crate root for convenience
pub use config::{merge_settings, BackendSettings};
pub use error::{Error, Result};
