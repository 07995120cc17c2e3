//! Record instances and field values.
//!
//! A [`RecordInstance`] is one concrete searchable object: a record type
//! name, an identity key, and a mapping of field name to current
//! [`FieldValue`]. Instances are handed to searchbind by the host at
//! indexing time and re-hydrated from backend hits at query time.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A field's current value.
///
/// Related-projection fields hold a nested [`RecordInstance`]; multi-valued
/// fields hold a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent / null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
    /// Multi-valued field.
    List(Vec<FieldValue>),
    /// Nested record for a related-projection field.
    Record(Box<RecordInstance>),
}

impl FieldValue {
    /// Returns `true` for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The string content, for string values only.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render this value as indexable text.
    ///
    /// Scalars render to their natural text form; lists join their members
    /// with spaces. Returns `None` for nulls and for nested records, which
    /// carry no directly indexable text of their own.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::Record(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::List(items) => {
                let parts: Option<Vec<String>> = items.iter().map(Self::as_text).collect();
                parts.map(|p| p.join(" "))
            }
        }
    }

    /// Compare two values for filtering purposes.
    ///
    /// Integers and floats compare numerically across the two
    /// representations. Values of incomparable kinds return `None`, which
    /// makes the enclosing range/ordering lookup evaluate false.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Returns `true` if the two values are equal for filtering purposes
    /// (numeric kinds coerce; `3` equals `3.0`).
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// Total ordering used for deterministic in-memory sorts.
    ///
    /// Values order first by kind rank (null, bool, numeric, string, list,
    /// record), then within kind. Unlike [`FieldValue::compare`] this is
    /// total, so sorting the same inputs always yields the same sequence.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &FieldValue) -> u8 {
            match v {
                FieldValue::Null => 0,
                FieldValue::Bool(_) => 1,
                FieldValue::Int(_) | FieldValue::Float(_) => 2,
                FieldValue::Str(_) => 3,
                FieldValue::List(_) => 4,
                FieldValue::Record(_) => 5,
            }
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.sort_cmp(y) {
                        Ordering::Equal => continue,
                        non_eq => return non_eq,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Record(a), Self::Record(b)) => a.id.cmp(&b.id),
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    /// Convert to a JSON value for backend document payloads.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One concrete searchable record: identity key plus current field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInstance {
    /// Name of this record's type.
    pub record_type: String,
    /// Stable identity key within the record type.
    pub id: String,
    /// Field name to current value.
    pub values: BTreeMap<String, FieldValue>,
}

impl RecordInstance {
    /// Create an instance with no field values.
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Set one field value.
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Set a string field value.
    pub fn with_str(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, FieldValue::Str(value.into()))
    }

    /// Set an integer field value.
    pub fn with_int(self, name: impl Into<String>, value: i64) -> Self {
        self.with(name, FieldValue::Int(value))
    }

    /// Look up a dotted field path, traversing nested records for
    /// related-projection segments. Missing fields resolve to `None`.
    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let value = self.values.get(head)?;
        match (value, rest) {
            (_, None) => Some(value),
            (FieldValue::Record(nested), Some(rest)) => nested.get(rest),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
