//! The process-lifetime schema registry.
//!
//! Backends resolve record types through a [`SchemaRegistry`]: a mapping
//! from type name to [`RecordType`], built once at startup and treated as
//! immutable afterwards. The registry also tracks parent links for
//! non-indexed subtypes so that an instance of a subtype can be routed to
//! the index of its nearest indexed ancestor.

use std::collections::BTreeMap;

use searchbind_core::{Error, Result};

use crate::field::RecordType;

/// Registry of indexed record types and subtype ancestry.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, RecordType>,
    // child type name -> parent type name, for types that are not
    // themselves indexed.
    parents: BTreeMap<String, String>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an indexed record type.
    ///
    /// Registering the same type name twice is a configuration error.
    pub fn register(&mut self, record_type: RecordType) -> Result<()> {
        if self.types.contains_key(&record_type.name) {
            return Err(Error::configuration(format!(
                "record type '{}' is already registered",
                record_type.name
            )));
        }
        if let Some(parent) = &record_type.parent {
            self.parents
                .insert(record_type.name.clone(), parent.clone());
        }
        self.types.insert(record_type.name.clone(), record_type);
        Ok(())
    }

    /// Record that `child` descends from `parent` without being indexed
    /// itself. Instances of `child` are routed to `parent`'s index.
    pub fn register_subtype(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.parents.insert(child.into(), parent.into());
    }

    /// Look up an indexed record type by name.
    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.types.get(name)
    }

    /// Returns `true` if `name` is a registered indexed type.
    pub fn is_registered(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Names of all registered indexed types, in deterministic order.
    pub fn names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// All registered indexed types, in deterministic order.
    pub fn types(&self) -> impl Iterator<Item = &RecordType> {
        self.types.values()
    }

    /// Resolve `name` to its nearest indexed ancestor type, walking parent
    /// links. A registered type resolves to itself. Returns `None` when no
    /// ancestor is indexed.
    pub fn indexed_ancestor(&self, name: &str) -> Option<&RecordType> {
        let mut current = name;
        loop {
            if let Some(rt) = self.types.get(current) {
                return Some(rt);
            }
            current = self.parents.get(current)?;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
