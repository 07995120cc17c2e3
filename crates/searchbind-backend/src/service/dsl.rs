//! Rendering compiled queries into the service's JSON search DSL.
//!
//! The service speaks an Elasticsearch-style DSL: a `query` tree of
//! `bool` / `term` / `range` / `multi_match` nodes, plus `sort`, `from`
//! and `size`. The renderer is pure; it never talks to a transport.
//!
//! Operators without a native rendering (`iexact`, `contains`,
//! `icontains`, `endswith`) are rejected by the compiler before a query
//! ever reaches this module.

use serde_json::{json, Map, Value};

use searchbind_core::{Error, Result};
use searchbind_query::{Connector, FilterNode, LookupOperator, Operand, SearchQuery, TermOperator};

use crate::compiler::CompiledQuery;

/// Lookups the service DSL cannot express. Declared here, enforced by the
/// compiler.
pub(crate) const UNSUPPORTED_LOOKUPS: &[LookupOperator] = &[
    LookupOperator::IExact,
    LookupOperator::Contains,
    LookupOperator::IContains,
    LookupOperator::EndsWith,
];

/// Render the full search body: query, sort, and the result window.
pub fn search_body(query: &CompiledQuery, offset: usize, limit: Option<usize>) -> Result<Value> {
    let mut body = Map::new();
    body.insert("query".into(), query_node(query)?);

    if !query.order.is_empty() {
        let sort: Vec<Value> = query
            .order
            .entries()
            .iter()
            .map(|entry| {
                json!({ entry.path.clone(): {
                    "order": if entry.descending { "desc" } else { "asc" }
                }})
            })
            .collect();
        body.insert("sort".into(), Value::Array(sort));
    }

    if offset > 0 {
        body.insert("from".into(), json!(offset));
    }
    if let Some(limit) = limit {
        body.insert("size".into(), json!(limit));
    }
    Ok(Value::Object(body))
}

/// Render the body for a count request: the query tree alone.
pub fn count_body(query: &CompiledQuery) -> Result<Value> {
    Ok(json!({ "query": query_node(query)? }))
}

/// Combine the text and filter halves into one query tree.
fn query_node(query: &CompiledQuery) -> Result<Value> {
    let text = text_node(query);
    match filter_node(&query.filter)? {
        None => Ok(text),
        Some(filter) => Ok(json!({
            "bool": { "must": [text], "filter": [filter] }
        })),
    }
}

fn text_node(query: &CompiledQuery) -> Value {
    match &query.query {
        SearchQuery::MatchAll => json!({ "match_all": {} }),
        SearchQuery::MatchNone => json!({ "match_none": {} }),
        SearchQuery::PlainText { text, operator } => json!({
            "multi_match": {
                "query": text,
                "fields": field_boosts(query, false),
                "operator": match operator {
                    TermOperator::And => "and",
                    TermOperator::Or => "or",
                },
            }
        }),
        SearchQuery::Prefix { text } => json!({
            "multi_match": {
                "query": text,
                "fields": field_boosts(query, true),
                "type": "phrase_prefix",
            }
        }),
    }
}

/// The boosted field list, `["title^2", "body"]` style, honoring any field
/// restriction on the request.
fn field_boosts(query: &CompiledQuery, autocomplete_only: bool) -> Vec<String> {
    query
        .record_type
        .search_fields()
        .into_iter()
        .filter(|f| !autocomplete_only || f.autocomplete)
        .filter(|f| match &query.fields {
            Some(fields) => fields.iter().any(|p| p == &f.path),
            None => true,
        })
        .map(|f| {
            if (f.weight - 1.0).abs() < f32::EPSILON {
                f.path
            } else {
                format!("{}^{}", f.path, f.weight)
            }
        })
        .collect()
}

/// Render a filter subtree, `None` for `MatchAll` (no filter clause).
fn filter_node(node: &FilterNode) -> Result<Option<Value>> {
    match node {
        FilterNode::MatchAll => Ok(None),
        FilterNode::MatchNone => Ok(Some(json!({ "match_none": {} }))),
        FilterNode::Combine {
            connector,
            children,
            negated,
        } => {
            let rendered: Vec<Value> = children
                .iter()
                .map(|child| {
                    filter_node(child).map(|r| r.unwrap_or_else(|| json!({ "match_all": {} })))
                })
                .collect::<Result<_>>()?;
            let inner = match connector {
                Connector::And => json!({ "bool": { "must": rendered } }),
                Connector::Or => json!({
                    "bool": { "should": rendered, "minimum_should_match": 1 }
                }),
            };
            if *negated {
                Ok(Some(json!({ "bool": { "must_not": [inner] } })))
            } else {
                Ok(Some(inner))
            }
        }
        FilterNode::Lookup {
            path,
            operator,
            operand,
        } => lookup_node(path, *operator, operand).map(Some),
    }
}

fn lookup_node(path: &str, operator: LookupOperator, operand: &Operand) -> Result<Value> {
    let value = |op: &Operand| -> Result<Value> {
        match op {
            Operand::Value(v) => Ok(v.to_json()),
            other => Err(malformed(path, operator, other)),
        }
    };

    match operator {
        LookupOperator::Exact => Ok(json!({ "term": { path: value(operand)? } })),
        LookupOperator::In => match operand {
            Operand::List(values) => {
                let values: Vec<Value> = values.iter().map(|v| v.to_json()).collect();
                Ok(json!({ "terms": { path: values } }))
            }
            other => Err(malformed(path, operator, other)),
        },
        LookupOperator::Gt => Ok(json!({ "range": { path: { "gt": value(operand)? } } })),
        LookupOperator::Gte => Ok(json!({ "range": { path: { "gte": value(operand)? } } })),
        LookupOperator::Lt => Ok(json!({ "range": { path: { "lt": value(operand)? } } })),
        LookupOperator::Lte => Ok(json!({ "range": { path: { "lte": value(operand)? } } })),
        LookupOperator::Range => match operand {
            Operand::Bounds(low, high) => Ok(json!({
                "range": { path: { "gte": low.to_json(), "lte": high.to_json() } }
            })),
            other => Err(malformed(path, operator, other)),
        },
        LookupOperator::StartsWith => Ok(json!({ "prefix": { path: value(operand)? } })),
        LookupOperator::IsNull => match operand {
            Operand::Flag(true) => Ok(json!({
                "bool": { "must_not": [{ "exists": { "field": path } }] }
            })),
            Operand::Flag(false) => Ok(json!({ "exists": { "field": path } })),
            other => Err(malformed(path, operator, other)),
        },
        LookupOperator::IExact
        | LookupOperator::Contains
        | LookupOperator::IContains
        | LookupOperator::EndsWith => Err(Error::configuration_field(
            format!("lookup '{operator}' has no service DSL rendering"),
            path,
        )),
    }
}

fn malformed(path: &str, operator: LookupOperator, operand: &Operand) -> Error {
    Error::configuration_field(
        format!("lookup '{operator}' on '{path}' has a mismatched operand: {operand:?}"),
        path,
    )
}

/// Index mapping for a record type: search fields as analyzed text, filter
/// fields as keyword/value fields, related projections as nested objects.
pub fn mapping(record_type: &searchbind_schema::RecordType) -> Value {
    json!({ "properties": properties(&record_type.fields) })
}

fn properties(fields: &[searchbind_schema::FieldDescriptor]) -> Value {
    use searchbind_schema::FieldKind;

    let mut props = Map::new();
    for field in fields {
        let spec = match &field.kind {
            FieldKind::Search { autocomplete, .. } => {
                if *autocomplete {
                    json!({ "type": "text", "index_prefixes": {} })
                } else {
                    json!({ "type": "text" })
                }
            }
            FieldKind::Filter => json!({ "type": "keyword" }),
            FieldKind::Related { fields } => json!({
                "type": "object",
                "properties": properties(fields),
            }),
        };
        props.insert(field.name.clone(), spec);
    }
    Value::Object(props)
}

// ============================================================================
// Tests
// ============================================================================
