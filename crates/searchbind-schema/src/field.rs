//! Field descriptors and record type schemas.
//!
//! A [`FieldDescriptor`] declares how one attribute of a record is indexed:
//!
//! - [`FieldKind::Search`]: full-text searchable, with a relevance weight and
//!   an optional autocomplete (prefix-match) flag
//! - [`FieldKind::Filter`]: stored as a filterable and orderable value
//! - [`FieldKind::Related`]: a related-object projection carrying its own
//!   nested descriptors, addressed with dotted paths such as `author.name`
//!
//! # Example
//!
//! ```rust
//! use searchbind_schema::{FieldDescriptor, RecordType};
//!
//! let book = RecordType::new("book")
//!     .with_field(FieldDescriptor::search("title").with_weight(2.0).with_autocomplete())
//!     .with_field(FieldDescriptor::search("body"))
//!     .with_field(FieldDescriptor::filter("published_year"))
//!     .with_field(FieldDescriptor::related(
//!         "author",
//!         vec![
//!             FieldDescriptor::search("name"),
//!             FieldDescriptor::filter("country"),
//!         ],
//!     ));
//!
//! assert!(book.resolve_path("author.country").is_some());
//! assert!(book.resolve_path("publisher").is_none());
//! ```

use serde::{Deserialize, Serialize};

/// How one attribute of a record is indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Full-text searchable.
    Search {
        /// Relevance weight applied to matches in this field.
        weight: f32,
        /// Whether this field also participates in prefix (autocomplete)
        /// matching.
        autocomplete: bool,
    },
    /// Stored as a filterable and orderable value.
    Filter,
    /// A related-object projection with its own nested descriptors.
    Related {
        /// Descriptors for the projected fields of the related record.
        fields: Vec<FieldDescriptor>,
    },
}

/// Static metadata for one indexed attribute. Never mutated after the owning
/// [`RecordType`] is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Attribute name on the record.
    pub name: String,
    /// How the attribute is indexed.
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Declare a full-text search field with weight 1.0.
    pub fn search(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Search {
                weight: 1.0,
                autocomplete: false,
            },
        }
    }

    /// Declare a filterable/orderable field.
    pub fn filter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Filter,
        }
    }

    /// Declare a related-object projection.
    pub fn related(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Related { fields },
        }
    }

    /// Set the relevance weight. Only meaningful on search fields.
    pub fn with_weight(mut self, weight: f32) -> Self {
        if let FieldKind::Search { weight: w, .. } = &mut self.kind {
            *w = weight;
        }
        self
    }

    /// Include this field in prefix (autocomplete) matching. Only meaningful
    /// on search fields.
    pub fn with_autocomplete(mut self) -> Self {
        if let FieldKind::Search { autocomplete, .. } = &mut self.kind {
            *autocomplete = true;
        }
        self
    }

    /// Returns `true` for full-text search fields.
    pub fn is_search(&self) -> bool {
        matches!(self.kind, FieldKind::Search { .. })
    }

    /// Returns `true` for filterable fields.
    pub fn is_filter(&self) -> bool {
        matches!(self.kind, FieldKind::Filter)
    }

    /// Returns `true` for related-object projections.
    pub fn is_related(&self) -> bool {
        matches!(self.kind, FieldKind::Related { .. })
    }
}

/// A search field addressed by its full dotted path, as yielded by
/// [`RecordType::search_fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFieldRef {
    /// Dotted path from the record root, e.g. `author.name`.
    pub path: String,
    /// Relevance weight.
    pub weight: f32,
    /// Whether the field participates in prefix matching.
    pub autocomplete: bool,
}

/// A schema of searchable attributes shared by a class of records, plus a
/// stable identity name. Immutable once registered for the process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    /// Stable identity of this record type.
    pub name: String,
    /// Name of the parent record type, for polymorphic subtype resolution.
    pub parent: Option<String>,
    /// Ordered field descriptor set.
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    /// Create a record type with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Name the parent record type this one descends from.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add one field descriptor.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several field descriptors.
    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Resolve a dotted field path to its descriptor, following
    /// related-projection segments. Returns `None` for paths that do not
    /// land on a declared descriptor.
    pub fn resolve_path(&self, path: &str) -> Option<&FieldDescriptor> {
        let mut fields = &self.fields;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let descriptor = fields.iter().find(|f| f.name == segment)?;

            if segments.peek().is_none() {
                return Some(descriptor);
            }

            // Intermediate segments must be related projections.
            match &descriptor.kind {
                FieldKind::Related { fields: nested } => fields = nested,
                _ => return None,
            }
        }

        None
    }

    /// All full-text search fields, including those nested in related
    /// projections, addressed by dotted path.
    pub fn search_fields(&self) -> Vec<SearchFieldRef> {
        let mut out = Vec::new();
        collect_search_fields(&self.fields, None, &mut out);
        out
    }

    /// The subset of search fields flagged for autocomplete matching.
    pub fn autocomplete_fields(&self) -> Vec<SearchFieldRef> {
        self.search_fields()
            .into_iter()
            .filter(|f| f.autocomplete)
            .collect()
    }

    /// Returns `true` if `path` resolves to a filterable field.
    pub fn is_filterable(&self, path: &str) -> bool {
        self.resolve_path(path).is_some_and(FieldDescriptor::is_filter)
    }
}

fn collect_search_fields(
    fields: &[FieldDescriptor],
    prefix: Option<&str>,
    out: &mut Vec<SearchFieldRef>,
) {
    for field in fields {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{}", field.name),
            None => field.name.clone(),
        };
        match &field.kind {
            FieldKind::Search {
                weight,
                autocomplete,
            } => out.push(SearchFieldRef {
                path,
                weight: *weight,
                autocomplete: *autocomplete,
            }),
            FieldKind::Related { fields: nested } => {
                collect_search_fields(nested, Some(&path), out);
            }
            FieldKind::Filter => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
