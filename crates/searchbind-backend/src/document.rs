//! Projection of record instances into indexable documents.
//!
//! Backends do not index raw [`RecordInstance`]s; they index the projection
//! declared by the record type's field descriptors. [`build_document`]
//! produces the JSON payload the service backend ships over the wire, and
//! [`search_texts`] extracts the weighted full-text content the local
//! backend matches against. Both reject values that cannot be rendered for
//! their declared kind, surfacing the per-record indexing error that
//! `catch_indexing_errors` governs.

use serde_json::{Map, Value};

use searchbind_core::{Error, Result};
use searchbind_schema::{
    FieldDescriptor, FieldKind, FieldValue, RecordInstance, RecordType, SearchFieldRef,
};

/// Project an instance into the JSON document indexed by the service
/// backend. Field names mirror the descriptor paths; related projections
/// become nested objects (or arrays of objects for multi-valued fields).
pub fn build_document(record_type: &RecordType, instance: &RecordInstance) -> Result<Value> {
    project(&record_type.fields, instance, &instance.id).map(Value::Object)
}

fn project(
    fields: &[FieldDescriptor],
    instance: &RecordInstance,
    record_label: &str,
) -> Result<Map<String, Value>> {
    let mut doc = Map::new();

    for field in fields {
        let Some(value) = instance.values.get(&field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        match &field.kind {
            FieldKind::Search { .. } => {
                let text = value.as_text().ok_or_else(|| {
                    Error::indexing(
                        record_label,
                        format!("search field '{}' holds a non-text value", field.name),
                    )
                })?;
                doc.insert(field.name.clone(), Value::String(text));
            }
            FieldKind::Filter => {
                doc.insert(field.name.clone(), value.to_json());
            }
            FieldKind::Related { fields: nested } => {
                let projected = match value {
                    FieldValue::Record(rec) => {
                        Value::Object(project(nested, rec, record_label)?)
                    }
                    FieldValue::List(items) => {
                        let mut array = Vec::with_capacity(items.len());
                        for item in items {
                            match item {
                                FieldValue::Record(rec) => {
                                    array.push(Value::Object(project(nested, rec, record_label)?));
                                }
                                other => {
                                    return Err(Error::indexing(
                                        record_label,
                                        format!(
                                            "related field '{}' holds a non-record value: {other:?}",
                                            field.name
                                        ),
                                    ))
                                }
                            }
                        }
                        Value::Array(array)
                    }
                    other => {
                        return Err(Error::indexing(
                            record_label,
                            format!(
                                "related field '{}' holds a non-record value: {other:?}",
                                field.name
                            ),
                        ))
                    }
                };
                doc.insert(field.name.clone(), projected);
            }
        }
    }

    Ok(doc)
}

/// Extract the full-text content of an instance: one `(field, text)` pair
/// per search field that holds a value, restricted to `fields` when given.
///
/// Fails with an indexing error when a search field holds a value that has
/// no text rendering (a nested record in a plain search field).
pub fn search_texts(
    record_type: &RecordType,
    instance: &RecordInstance,
    fields: Option<&[String]>,
    autocomplete_only: bool,
) -> Result<Vec<(SearchFieldRef, String)>> {
    let mut out = Vec::new();

    for field in record_type.search_fields() {
        if autocomplete_only && !field.autocomplete {
            continue;
        }
        if let Some(restrict) = fields {
            if !restrict.iter().any(|f| f == &field.path) {
                continue;
            }
        }

        let Some(value) = instance.get(&field.path) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        let text = value.as_text().ok_or_else(|| {
            Error::indexing(
                &instance.id,
                format!("search field '{}' holds a non-text value", field.path),
            )
        })?;
        out.push((field, text));
    }

    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================
