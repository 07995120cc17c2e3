//! The host schema interface.
//!
//! Searchbind never reaches into the host application's data layer
//! directly. Everything it needs — the set of indexed record types, a way
//! to stream all records of a type for rebuilds, and a way to resolve a
//! backend hit back into a live record — comes through the [`RecordSource`]
//! trait.
//!
//! [`MemorySource`] is the in-memory implementation, used by tests and by
//! hosts whose records already live in process memory.

use std::collections::BTreeMap;
use std::sync::RwLock;

use searchbind_core::Result;

use crate::field::RecordType;
use crate::record::RecordInstance;

/// The host's view of its searchable records.
///
/// Implementations must be safe to call from multiple threads; every method
/// may be invoked concurrently with record mutations on the host side.
pub trait RecordSource: Send + Sync {
    /// The record types this source supplies, with their field descriptor
    /// sets.
    fn record_types(&self) -> Vec<RecordType>;

    /// Stream all current records of one type, in a stable order. Used by
    /// the rebuilder's populate phase.
    fn fetch_all(
        &self,
        record_type: &str,
    ) -> Result<Box<dyn Iterator<Item = RecordInstance> + Send + '_>>;

    /// Resolve an identity key back to a live record, or `None` if the
    /// record no longer exists.
    fn resolve(&self, record_type: &str, id: &str) -> Option<RecordInstance>;
}

/// In-memory record source.
///
/// Holds record types and instances in process memory behind a lock, so a
/// test (or an in-process host) can mutate records while backends read
/// them.
#[derive(Debug, Default)]
pub struct MemorySource {
    types: Vec<RecordType>,
    records: RwLock<BTreeMap<(String, String), RecordInstance>>,
}

impl MemorySource {
    /// Create a source supplying the given record types.
    pub fn new(types: Vec<RecordType>) -> Self {
        Self {
            types,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert or replace a record.
    pub fn insert(&self, instance: RecordInstance) {
        let key = (instance.record_type.clone(), instance.id.clone());
        self.records
            .write()
            .expect("record store lock poisoned")
            .insert(key, instance);
    }

    /// Remove a record. Removing an absent record is a no-op.
    pub fn remove(&self, record_type: &str, id: &str) {
        self.records
            .write()
            .expect("record store lock poisoned")
            .remove(&(record_type.to_string(), id.to_string()));
    }

    /// Number of records held for one type.
    pub fn len(&self, record_type: &str) -> usize {
        self.records
            .read()
            .expect("record store lock poisoned")
            .keys()
            .filter(|(t, _)| t == record_type)
            .count()
    }

    /// Returns `true` if no records of the given type are held.
    pub fn is_empty(&self, record_type: &str) -> bool {
        self.len(record_type) == 0
    }
}

impl RecordSource for MemorySource {
    fn record_types(&self) -> Vec<RecordType> {
        self.types.clone()
    }

    fn fetch_all(
        &self,
        record_type: &str,
    ) -> Result<Box<dyn Iterator<Item = RecordInstance> + Send + '_>> {
        let records = self.records.read().expect("record store lock poisoned");
        // Snapshot under the read lock; BTreeMap keys give stable id order.
        let items: Vec<RecordInstance> = records
            .iter()
            .filter(|((t, _), _)| t == record_type)
            .map(|(_, instance)| instance.clone())
            .collect();
        Ok(Box::new(items.into_iter()))
    }

    fn resolve(&self, record_type: &str, id: &str) -> Option<RecordInstance> {
        self.records
            .read()
            .expect("record store lock poisoned")
            .get(&(record_type.to_string(), id.to_string()))
            .cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
