//! Query compilation and validation.
//!
//! [`compile`] turns a raw [`SearchRequest`](crate::SearchRequest) into a
//! [`CompiledQuery`] a backend can execute, rejecting anything the schema or
//! the backend cannot honor. Validation happens here, at compile time, so
//! misuse surfaces as a [`Error::Configuration`] before any transport work:
//!
//! - filter paths must resolve to filterable fields of the record type
//! - lookup operators must be supported by the target backend
//! - operand shapes must match their operator (`range` takes bounds,
//!   `in` takes a list, `isnull` takes a flag)
//! - field restrictions must name search fields (autocomplete-flagged ones
//!   for prefix queries)
//! - order paths must resolve to filterable fields
//!
//! The filter tree is normalized with [`FilterNode::simplify`] before
//! validation, so constant subtrees (`in []`, empty conjunctions) never
//! reach a backend.

use searchbind_core::{Error, Result};
use searchbind_query::{FilterNode, LookupOperator, Operand, OrderDirective, SearchQuery};
use searchbind_schema::RecordType;

use crate::backend::SearchRequest;

/// What the target backend can and cannot execute, declared per backend and
/// consulted during compilation.
#[derive(Debug, Clone, Copy)]
pub struct CompilerOptions {
    /// Lookup operators the backend has no native rendering for. Requests
    /// using one fail compilation instead of silently degrading.
    pub unsupported_operators: &'static [LookupOperator],
    /// Whether the backend applies `order` natively. When `false`, the
    /// executor re-sorts the hits after retrieval.
    pub native_ordering: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            unsupported_operators: &[],
            native_ordering: false,
        }
    }
}

/// A validated, normalized search ready for a backend to execute.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// The record type searched.
    pub record_type: RecordType,
    /// The full-text half of the request.
    pub query: SearchQuery,
    /// The structured half, simplified.
    pub filter: FilterNode,
    /// Search-field restriction, `None` for all search fields.
    pub fields: Option<Vec<String>>,
    /// Requested ordering.
    pub order: OrderDirective,
    /// `true` when the backend orders natively; otherwise the executor
    /// applies a stable post-hoc sort.
    pub native_ordering: bool,
}

impl CompiledQuery {
    /// A query that matches nothing, for record types the backend does
    /// not index.
    pub fn empty(record_type: impl Into<String>) -> Self {
        Self {
            record_type: RecordType::new(record_type),
            query: SearchQuery::MatchNone,
            filter: FilterNode::MatchAll,
            fields: None,
            order: OrderDirective::new(),
            native_ordering: false,
        }
    }

    /// Returns `true` when the query can be answered as empty without any
    /// backend round trip: blank text, `MatchNone`, or a filter that is
    /// constantly false.
    pub fn is_statically_empty(&self) -> bool {
        self.query.is_statically_empty() || self.filter.is_match_none()
    }
}

/// Compile and validate a request against a record type for a backend with
/// the given capabilities.
///
/// # Errors
///
/// Returns [`Error::Configuration`] (carrying the offending field path where
/// one exists) for schema or capability violations.
pub fn compile(
    record_type: &RecordType,
    request: &SearchRequest,
    options: &CompilerOptions,
) -> Result<CompiledQuery> {
    let filter = request.filter.simplify();
    check_filter(record_type, &filter, options)?;
    check_fields(record_type, &request.query, request.fields.as_deref())?;
    check_order(record_type, &request.order)?;

    Ok(CompiledQuery {
        record_type: record_type.clone(),
        query: request.query.clone(),
        filter,
        fields: request.fields.clone(),
        order: request.order.clone(),
        native_ordering: options.native_ordering,
    })
}

fn check_filter(
    record_type: &RecordType,
    node: &FilterNode,
    options: &CompilerOptions,
) -> Result<()> {
    match node {
        FilterNode::MatchAll | FilterNode::MatchNone => Ok(()),
        FilterNode::Combine { children, .. } => {
            for child in children {
                check_filter(record_type, child, options)?;
            }
            Ok(())
        }
        FilterNode::Lookup {
            path,
            operator,
            operand,
        } => {
            let descriptor = record_type.resolve_path(path).ok_or_else(|| {
                Error::configuration_field(
                    format!("cannot filter '{}' on unknown field '{path}'", record_type.name),
                    path.clone(),
                )
            })?;
            if !descriptor.is_filter() {
                return Err(Error::configuration_field(
                    format!("field '{path}' of '{}' is not filterable", record_type.name),
                    path.clone(),
                ));
            }
            if options.unsupported_operators.contains(operator) {
                return Err(Error::configuration_field(
                    format!("lookup '{operator}' is not supported by this backend"),
                    path.clone(),
                ));
            }
            check_operand(path, *operator, operand)
        }
    }
}

fn check_operand(path: &str, operator: LookupOperator, operand: &Operand) -> Result<()> {
    let ok = match operator {
        LookupOperator::Range => matches!(operand, Operand::Bounds(_, _)),
        LookupOperator::In => matches!(operand, Operand::List(_)),
        LookupOperator::IsNull => matches!(operand, Operand::Flag(_)),
        _ => matches!(operand, Operand::Value(_)),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::configuration_field(
            format!("lookup '{operator}' on '{path}' has a mismatched operand"),
            path,
        ))
    }
}

fn check_fields(
    record_type: &RecordType,
    query: &SearchQuery,
    fields: Option<&[String]>,
) -> Result<()> {
    let Some(fields) = fields else {
        return Ok(());
    };
    let prefix = matches!(query, SearchQuery::Prefix { .. });
    let search_fields = record_type.search_fields();

    for path in fields {
        let Some(field) = search_fields.iter().find(|f| &f.path == path) else {
            return Err(Error::configuration_field(
                format!("'{path}' is not a search field of '{}'", record_type.name),
                path.clone(),
            ));
        };
        if prefix && !field.autocomplete {
            return Err(Error::configuration_field(
                format!("field '{path}' is not flagged for autocomplete"),
                path.clone(),
            ));
        }
    }
    Ok(())
}

fn check_order(record_type: &RecordType, order: &OrderDirective) -> Result<()> {
    for entry in order.entries() {
        if !record_type.is_filterable(&entry.path) {
            return Err(Error::configuration_field(
                format!(
                    "cannot order '{}' by non-filterable field '{}'",
                    record_type.name, entry.path
                ),
                entry.path.clone(),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use searchbind_schema::{FieldDescriptor, FieldValue};

    fn book_type() -> RecordType {
        RecordType::new("book")
            .with_field(FieldDescriptor::search("title").with_autocomplete())
            .with_field(FieldDescriptor::search("body"))
            .with_field(FieldDescriptor::filter("year"))
            .with_field(FieldDescriptor::related(
                "author",
                vec![FieldDescriptor::filter("country")],
            ))
    }

    fn request() -> SearchRequest {
        SearchRequest::new("book", SearchQuery::plain("dune"))
    }

    #[test]
    fn test_compile_plain_request() {
        let compiled = compile(&book_type(), &request(), &CompilerOptions::default()).unwrap();
        assert!(!compiled.is_statically_empty());
        assert!(!compiled.native_ordering);
    }

    #[test]
    fn test_unknown_filter_field_rejected() {
        let req = request().filter(FilterNode::exact("publisher", FieldValue::Str("x".into())));
        let err = compile(&book_type(), &req, &CompilerOptions::default()).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.field(), Some("publisher"));
    }

    #[test]
    fn test_search_field_not_filterable() {
        let req = request().filter(FilterNode::exact("title", FieldValue::Str("x".into())));
        let err = compile(&book_type(), &req, &CompilerOptions::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_nested_filter_path_accepted() {
        let req = request().filter(FilterNode::exact(
            "author.country",
            FieldValue::Str("US".into()),
        ));
        assert!(compile(&book_type(), &req, &CompilerOptions::default()).is_ok());
    }

    #[test]
    fn test_unsupported_operator_rejected() {
        let options = CompilerOptions {
            unsupported_operators: &[LookupOperator::Contains],
            native_ordering: true,
        };
        let req = request().filter(FilterNode::contains("year", FieldValue::Int(5)));
        let err = compile(&book_type(), &req, &options).unwrap_err();
        assert!(err.to_string().contains("contains"));
        // The same request compiles for a backend without the restriction.
        assert!(compile(&book_type(), &req, &CompilerOptions::default()).is_ok());
    }

    #[test]
    fn test_mismatched_operand_rejected() {
        let req = request().filter(FilterNode::Lookup {
            path: "year".into(),
            operator: LookupOperator::Range,
            operand: Operand::Value(FieldValue::Int(5)),
        });
        let err = compile(&book_type(), &req, &CompilerOptions::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_field_restriction_checked() {
        let req = request().restrict_fields(vec!["year".into()]);
        let err = compile(&book_type(), &req, &CompilerOptions::default()).unwrap_err();
        assert!(err.is_configuration());

        let req = request().restrict_fields(vec!["body".into()]);
        assert!(compile(&book_type(), &req, &CompilerOptions::default()).is_ok());
    }

    #[test]
    fn test_prefix_requires_autocomplete_field() {
        let req = SearchRequest::new("book", SearchQuery::prefix("du"))
            .restrict_fields(vec!["body".into()]);
        let err = compile(&book_type(), &req, &CompilerOptions::default()).unwrap_err();
        assert!(err.to_string().contains("autocomplete"));

        let req = SearchRequest::new("book", SearchQuery::prefix("du"))
            .restrict_fields(vec!["title".into()]);
        assert!(compile(&book_type(), &req, &CompilerOptions::default()).is_ok());
    }

    #[test]
    fn test_order_path_checked() {
        let req = request().order(OrderDirective::new().asc("title"));
        let err = compile(&book_type(), &req, &CompilerOptions::default()).unwrap_err();
        assert!(err.is_configuration());

        let req = request().order(OrderDirective::new().desc("year"));
        assert!(compile(&book_type(), &req, &CompilerOptions::default()).is_ok());
    }

    #[test]
    fn test_constant_false_filter_is_statically_empty() {
        let req = request().filter(FilterNode::is_in("year", vec![]));
        let compiled = compile(&book_type(), &req, &CompilerOptions::default()).unwrap();
        assert!(compiled.is_statically_empty());
    }
}
