//! The filter tree.
//!
//! A [`FilterNode`] is the backend-agnostic representation of a "where"
//! clause: lookups at the leaves, AND/OR connectors (possibly negated)
//! above them, and the constant nodes [`FilterNode::MatchAll`] and
//! [`FilterNode::MatchNone`]. Trees are built by the caller and are
//! immutable once handed to a query compiler.
//!
//! # Example
//!
//! ```rust
//! use searchbind_query::FilterNode;
//! use searchbind_schema::FieldValue;
//!
//! let filter = FilterNode::and(vec![
//!     FilterNode::gte("published_year", FieldValue::Int(1960)),
//!     FilterNode::not(FilterNode::exact(
//!         "author.country",
//!         FieldValue::Str("US".into()),
//!     )),
//! ]);
//! assert_eq!(filter.paths(), vec!["published_year", "author.country"]);
//! ```

use serde::{Deserialize, Serialize};
use searchbind_schema::FieldValue;

/// Lookup operators supported by the filter tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOperator {
    /// Equality (numeric kinds coerce).
    Exact,
    /// Case-insensitive string equality.
    IExact,
    /// Substring containment.
    Contains,
    /// Case-insensitive substring containment.
    IContains,
    /// String prefix.
    StartsWith,
    /// String suffix.
    EndsWith,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Inclusive range, both ends.
    Range,
    /// Membership in a value list.
    In,
    /// Null / absence check.
    IsNull,
}

impl LookupOperator {
    /// The operator's identifier, as used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Range => "range",
            Self::In => "in",
            Self::IsNull => "isnull",
        }
    }
}

impl std::fmt::Display for LookupOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// A single comparison value.
    Value(FieldValue),
    /// Inclusive lower and upper bounds, for `range`.
    Bounds(FieldValue, FieldValue),
    /// A membership list, for `in`.
    List(Vec<FieldValue>),
    /// The expected nullness, for `isnull`.
    Flag(bool),
}

/// Boolean connector kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connector {
    /// All children must match.
    And,
    /// At least one child must match.
    Or,
}

/// One node of the filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    /// A leaf condition on one field path.
    Lookup {
        /// Dotted field path the condition applies to.
        path: String,
        /// The lookup operator.
        operator: LookupOperator,
        /// The right-hand side.
        operand: Operand,
    },
    /// A boolean combination of child nodes.
    Combine {
        /// AND or OR.
        connector: Connector,
        /// Ordered child nodes.
        children: Vec<FilterNode>,
        /// Whether the combination is wrapped in a NOT.
        negated: bool,
    },
    /// Matches every record.
    MatchAll,
    /// Matches no record.
    MatchNone,
}

impl FilterNode {
    fn lookup(path: impl Into<String>, operator: LookupOperator, operand: Operand) -> Self {
        Self::Lookup {
            path: path.into(),
            operator,
            operand,
        }
    }

    /// Equality lookup.
    pub fn exact(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Exact, Operand::Value(value))
    }

    /// Case-insensitive equality lookup.
    pub fn iexact(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::IExact, Operand::Value(value))
    }

    /// Substring lookup.
    pub fn contains(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Contains, Operand::Value(value))
    }

    /// Case-insensitive substring lookup.
    pub fn icontains(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::IContains, Operand::Value(value))
    }

    /// Prefix lookup.
    pub fn startswith(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::StartsWith, Operand::Value(value))
    }

    /// Suffix lookup.
    pub fn endswith(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::EndsWith, Operand::Value(value))
    }

    /// Strictly-greater-than lookup.
    pub fn gt(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Gt, Operand::Value(value))
    }

    /// Greater-or-equal lookup.
    pub fn gte(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Gte, Operand::Value(value))
    }

    /// Strictly-less-than lookup.
    pub fn lt(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Lt, Operand::Value(value))
    }

    /// Less-or-equal lookup.
    pub fn lte(path: impl Into<String>, value: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Lte, Operand::Value(value))
    }

    /// Inclusive range lookup.
    pub fn range(path: impl Into<String>, low: FieldValue, high: FieldValue) -> Self {
        Self::lookup(path, LookupOperator::Range, Operand::Bounds(low, high))
    }

    /// Membership lookup. An empty list can never match.
    pub fn is_in(path: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self::lookup(path, LookupOperator::In, Operand::List(values))
    }

    /// Nullness lookup.
    pub fn isnull(path: impl Into<String>, expected: bool) -> Self {
        Self::lookup(path, LookupOperator::IsNull, Operand::Flag(expected))
    }

    /// Conjunction of child nodes.
    pub fn and(children: Vec<FilterNode>) -> Self {
        Self::Combine {
            connector: Connector::And,
            children,
            negated: false,
        }
    }

    /// Disjunction of child nodes.
    pub fn or(children: Vec<FilterNode>) -> Self {
        Self::Combine {
            connector: Connector::Or,
            children,
            negated: false,
        }
    }

    /// Negate a node. Negating a connector flips its `negated` flag;
    /// anything else is wrapped in a negated single-child AND.
    pub fn not(node: FilterNode) -> Self {
        match node {
            Self::Combine {
                connector,
                children,
                negated,
            } => Self::Combine {
                connector,
                children,
                negated: !negated,
            },
            other => Self::Combine {
                connector: Connector::And,
                children: vec![other],
                negated: true,
            },
        }
    }

    /// All field paths mentioned by lookups in this tree, in walk order.
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Lookup { path, .. } => out.push(path),
            Self::Combine { children, .. } => {
                for child in children {
                    child.collect_paths(out);
                }
            }
            Self::MatchAll | Self::MatchNone => {}
        }
    }

    /// Statically reduce the tree.
    ///
    /// - an `in` lookup with an empty list reduces to [`FilterNode::MatchNone`]
    /// - an AND with zero (remaining) children reduces to [`FilterNode::MatchAll`],
    ///   an OR to [`FilterNode::MatchNone`]
    /// - constant children propagate: any `MatchNone` under an AND makes it
    ///   `MatchNone`, any `MatchAll` under an OR makes it `MatchAll`
    /// - negation flips the constants
    ///
    /// A tree that reduces to `MatchNone` is statically empty: compilers
    /// mark such queries so the executor answers without any backend
    /// round-trip.
    pub fn simplify(&self) -> FilterNode {
        match self {
            Self::Lookup {
                operator: LookupOperator::In,
                operand: Operand::List(values),
                ..
            } if values.is_empty() => Self::MatchNone,
            Self::Lookup { .. } | Self::MatchAll | Self::MatchNone => self.clone(),
            Self::Combine {
                connector,
                children,
                negated,
            } => {
                let mut reduced = Vec::with_capacity(children.len());
                for child in children {
                    match (child.simplify(), connector) {
                        (Self::MatchNone, Connector::And) => {
                            return negate_const(Self::MatchNone, *negated)
                        }
                        (Self::MatchAll, Connector::Or) => {
                            return negate_const(Self::MatchAll, *negated)
                        }
                        // Identity elements drop out.
                        (Self::MatchAll, Connector::And) | (Self::MatchNone, Connector::Or) => {}
                        (node, _) => reduced.push(node),
                    }
                }

                match reduced.len() {
                    0 => {
                        let constant = match connector {
                            Connector::And => Self::MatchAll,
                            Connector::Or => Self::MatchNone,
                        };
                        negate_const(constant, *negated)
                    }
                    1 if !*negated => reduced.into_iter().next().unwrap_or(Self::MatchAll),
                    _ => Self::Combine {
                        connector: *connector,
                        children: reduced,
                        negated: *negated,
                    },
                }
            }
        }
    }

    /// Returns `true` if the tree statically matches nothing.
    pub fn is_match_none(&self) -> bool {
        matches!(self.simplify(), Self::MatchNone)
    }

    /// Returns `true` if the tree statically matches everything.
    pub fn is_match_all(&self) -> bool {
        matches!(self.simplify(), Self::MatchAll)
    }
}

fn negate_const(node: FilterNode, negated: bool) -> FilterNode {
    if !negated {
        return node;
    }
    match node {
        FilterNode::MatchAll => FilterNode::MatchNone,
        FilterNode::MatchNone => FilterNode::MatchAll,
        other => FilterNode::not(other),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_as_str() {
        assert_eq!(LookupOperator::Exact.as_str(), "exact");
        assert_eq!(LookupOperator::IsNull.to_string(), "isnull");
        assert_eq!(LookupOperator::StartsWith.as_str(), "startswith");
    }

    #[test]
    fn test_paths_walk_order() {
        let filter = FilterNode::and(vec![
            FilterNode::exact("a", FieldValue::Int(1)),
            FilterNode::or(vec![
                FilterNode::gt("b", FieldValue::Int(2)),
                FilterNode::isnull("c", true),
            ]),
        ]);
        assert_eq!(filter.paths(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_not_flips_connector() {
        let inner = FilterNode::and(vec![FilterNode::exact("a", FieldValue::Int(1))]);
        match FilterNode::not(inner) {
            FilterNode::Combine { negated, .. } => assert!(negated),
            other => panic!("unexpected node: {other:?}"),
        }
        // Double negation cancels.
        let lookup = FilterNode::exact("a", FieldValue::Int(1));
        match FilterNode::not(FilterNode::not(lookup)) {
            FilterNode::Combine { negated, .. } => assert!(!negated),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_simplify_empty_connectors() {
        assert_eq!(FilterNode::and(vec![]).simplify(), FilterNode::MatchAll);
        assert_eq!(FilterNode::or(vec![]).simplify(), FilterNode::MatchNone);
    }

    #[test]
    fn test_simplify_empty_in_list() {
        assert_eq!(
            FilterNode::is_in("a", vec![]).simplify(),
            FilterNode::MatchNone
        );
    }

    #[test]
    fn test_simplify_constant_propagation() {
        let filter = FilterNode::and(vec![
            FilterNode::exact("a", FieldValue::Int(1)),
            FilterNode::is_in("b", vec![]),
        ]);
        assert!(filter.is_match_none());

        let filter = FilterNode::or(vec![FilterNode::MatchAll, FilterNode::is_in("b", vec![])]);
        assert!(filter.is_match_all());
    }

    #[test]
    fn test_simplify_drops_identity_children() {
        let filter = FilterNode::and(vec![
            FilterNode::MatchAll,
            FilterNode::exact("a", FieldValue::Int(1)),
        ]);
        // Single remaining child is unwrapped.
        assert_eq!(
            filter.simplify(),
            FilterNode::exact("a", FieldValue::Int(1))
        );
    }

    #[test]
    fn test_simplify_negation_flips_constants() {
        assert_eq!(
            FilterNode::not(FilterNode::or(vec![])).simplify(),
            FilterNode::MatchAll
        );
        assert_eq!(
            FilterNode::not(FilterNode::and(vec![])).simplify(),
            FilterNode::MatchNone
        );
        // Negated OR whose only child is statically empty.
        let filter = FilterNode::not(FilterNode::or(vec![FilterNode::is_in("a", vec![])]));
        assert!(filter.is_match_all());
    }

    #[test]
    fn test_simplify_keeps_negated_wrapper() {
        let filter = FilterNode::not(FilterNode::exact("a", FieldValue::Int(1)));
        let simplified = filter.simplify();
        match simplified {
            FilterNode::Combine {
                negated, children, ..
            } => {
                assert!(negated);
                assert_eq!(children.len(), 1);
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_serialization_round_trip() {
        let filter = FilterNode::and(vec![
            FilterNode::range("year", FieldValue::Int(1960), FieldValue::Int(1970)),
            FilterNode::is_in(
                "tag",
                vec![FieldValue::Str("sf".into()), FieldValue::Str("classic".into())],
            ),
        ]);
        let json = serde_json::to_string(&filter).unwrap();
        let back: FilterNode = serde_json::from_str(&json).unwrap();
        assert_eq!(filter, back);
    }
}
