//! The reference in-memory evaluator.
//!
//! [`matches`] evaluates a filter tree directly against a record instance.
//! The local backend executes compiled queries with it, and the test suite
//! uses it as the oracle that every other backend's compiled form must
//! agree with.
//!
//! Lookup semantics:
//!
//! - a missing field evaluates like a null value
//! - multi-valued (list) fields match when any element satisfies the
//!   scalar condition
//! - ordering lookups (`gt`, `lt`, `range`, ...) on incomparable value
//!   kinds evaluate false rather than erroring
//! - string lookups (`contains`, `startswith`, ...) on non-string values
//!   evaluate false

use std::cmp::Ordering;

use searchbind_schema::{FieldValue, RecordInstance};

use crate::filter::{Connector, FilterNode, LookupOperator, Operand};
use crate::order::OrderDirective;

/// Evaluate a filter tree against one record.
pub fn matches(node: &FilterNode, instance: &RecordInstance) -> bool {
    match node {
        FilterNode::MatchAll => true,
        FilterNode::MatchNone => false,
        FilterNode::Combine {
            connector,
            children,
            negated,
        } => {
            let combined = match connector {
                Connector::And => children.iter().all(|c| matches(c, instance)),
                Connector::Or => children.iter().any(|c| matches(c, instance)),
            };
            combined != *negated
        }
        FilterNode::Lookup {
            path,
            operator,
            operand,
        } => lookup_matches(instance.get(path), *operator, operand),
    }
}

fn lookup_matches(value: Option<&FieldValue>, operator: LookupOperator, operand: &Operand) -> bool {
    // Nullness is decided on the field as a whole, before list fan-out.
    if operator == LookupOperator::IsNull {
        let expected = matches!(operand, Operand::Flag(true));
        let is_null = value.is_none_or(FieldValue::is_null);
        return is_null == expected;
    }

    let Some(value) = value else {
        return false;
    };

    match value {
        FieldValue::List(items) => items
            .iter()
            .any(|item| scalar_matches(item, operator, operand)),
        scalar => scalar_matches(scalar, operator, operand),
    }
}

fn scalar_matches(value: &FieldValue, operator: LookupOperator, operand: &Operand) -> bool {
    match (operator, operand) {
        (LookupOperator::Exact, Operand::Value(expected)) => value.loose_eq(expected),
        (LookupOperator::IExact, Operand::Value(expected)) => {
            match (value.as_str(), expected.as_str()) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => value.loose_eq(expected),
            }
        }
        (LookupOperator::Contains, Operand::Value(expected)) => {
            str_op(value, expected, |v, e| v.contains(e))
        }
        (LookupOperator::IContains, Operand::Value(expected)) => {
            str_op(value, expected, |v, e| {
                v.to_lowercase().contains(&e.to_lowercase())
            })
        }
        (LookupOperator::StartsWith, Operand::Value(expected)) => {
            str_op(value, expected, |v, e| v.starts_with(e))
        }
        (LookupOperator::EndsWith, Operand::Value(expected)) => {
            str_op(value, expected, |v, e| v.ends_with(e))
        }
        (LookupOperator::Gt, Operand::Value(expected)) => {
            value.compare(expected) == Some(Ordering::Greater)
        }
        (LookupOperator::Gte, Operand::Value(expected)) => {
            matches!(value.compare(expected), Some(Ordering::Greater | Ordering::Equal))
        }
        (LookupOperator::Lt, Operand::Value(expected)) => {
            value.compare(expected) == Some(Ordering::Less)
        }
        (LookupOperator::Lte, Operand::Value(expected)) => {
            matches!(value.compare(expected), Some(Ordering::Less | Ordering::Equal))
        }
        (LookupOperator::Range, Operand::Bounds(low, high)) => {
            matches!(value.compare(low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(value.compare(high), Some(Ordering::Less | Ordering::Equal))
        }
        (LookupOperator::In, Operand::List(expected)) => {
            expected.iter().any(|e| value.loose_eq(e))
        }
        // Operator/operand shape mismatch: the compiler's check() rejects
        // these before execution, so a stray one simply matches nothing.
        _ => false,
    }
}

fn str_op(value: &FieldValue, expected: &FieldValue, op: impl Fn(&str, &str) -> bool) -> bool {
    match (value.as_str(), expected.as_str()) {
        (Some(v), Some(e)) => op(v, e),
        _ => false,
    }
}

/// Compare two records under an ordering directive.
///
/// Missing fields compare as null. Ties across every key return
/// [`Ordering::Equal`], so a stable sort preserves the backend-returned
/// order between tied records.
pub fn compare_records(order: &OrderDirective, a: &RecordInstance, b: &RecordInstance) -> Ordering {
    for entry in order.entries() {
        let va = a.get(&entry.path).unwrap_or(&FieldValue::Null);
        let vb = b.get(&entry.path).unwrap_or(&FieldValue::Null);
        let mut cmp = va.sort_cmp(vb);
        if entry.descending {
            cmp = cmp.reverse();
        }
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

// ============================================================================
// Tests
// ============================================================================
