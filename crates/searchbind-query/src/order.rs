//! Ordering directives.
//!
//! An [`OrderDirective`] is an ordered list of field paths with a direction
//! per entry. An empty directive means "backend-default relevance order".

use serde::{Deserialize, Serialize};

/// One ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    /// Dotted field path to order by.
    pub path: String,
    /// Whether the ordering on this key is reversed.
    pub descending: bool,
}

/// An ordered sequence of ordering keys.
///
/// # Example
///
/// ```rust
/// use searchbind_query::OrderDirective;
///
/// let order = OrderDirective::new().asc("author.name").desc("published_year");
/// assert_eq!(order.entries().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderDirective {
    entries: Vec<OrderEntry>,
}

impl OrderDirective {
    /// An empty directive (backend-default relevance order).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending key.
    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.entries.push(OrderEntry {
            path: path.into(),
            descending: false,
        });
        self
    }

    /// Append a descending key.
    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.entries.push(OrderEntry {
            path: path.into(),
            descending: true,
        });
        self
    }

    /// The ordering keys, outermost first.
    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    /// Returns `true` when no explicit ordering was requested.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
