//! Full-text query variants.
//!
//! A [`SearchQuery`] carries the full-text half of a search request; the
//! filter tree carries the structured half. Queries whose text is blank are
//! statically empty and never reach the backend transport.

use serde::{Deserialize, Serialize};

/// How multiple search terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOperator {
    /// All terms must match.
    And,
    /// Any term can match.
    #[default]
    Or,
}

/// The full-text part of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchQuery {
    /// Whole-word search over the record type's search fields.
    PlainText {
        /// The query text.
        text: String,
        /// How the terms combine.
        operator: TermOperator,
    },
    /// Partial-word (autocomplete) search over the fields flagged for
    /// prefix matching.
    Prefix {
        /// The prefix text.
        text: String,
    },
    /// Match every indexed record of the type.
    MatchAll,
    /// Match nothing.
    MatchNone,
}

impl SearchQuery {
    /// A plain-text query with the default OR term operator.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText {
            text: text.into(),
            operator: TermOperator::default(),
        }
    }

    /// A plain-text query with an explicit term operator.
    pub fn plain_with(text: impl Into<String>, operator: TermOperator) -> Self {
        Self::PlainText {
            text: text.into(),
            operator,
        }
    }

    /// A prefix (autocomplete) query.
    pub fn prefix(text: impl Into<String>) -> Self {
        Self::Prefix { text: text.into() }
    }

    /// Returns `true` when this query can never match: `MatchNone`, or a
    /// text query whose text is blank.
    pub fn is_statically_empty(&self) -> bool {
        match self {
            Self::MatchNone => true,
            Self::PlainText { text, .. } | Self::Prefix { text } => text.trim().is_empty(),
            Self::MatchAll => false,
        }
    }

    /// The lowercased whitespace-separated terms of a text query. Empty for
    /// `MatchAll`/`MatchNone`.
    pub fn terms(&self) -> Vec<String> {
        match self {
            Self::PlainText { text, .. } | Self::Prefix { text } => text
                .split_whitespace()
                .map(|t| t.to_lowercase())
                .collect(),
            Self::MatchAll | Self::MatchNone => Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_operator_is_or() {
        match SearchQuery::plain("dune") {
            SearchQuery::PlainText { operator, .. } => assert_eq!(operator, TermOperator::Or),
            other => panic!("unexpected query: {other:?}"),
        }
    }

    #[test]
    fn test_statically_empty() {
        assert!(SearchQuery::MatchNone.is_statically_empty());
        assert!(SearchQuery::plain("").is_statically_empty());
        assert!(SearchQuery::plain("   ").is_statically_empty());
        assert!(SearchQuery::prefix("").is_statically_empty());
        assert!(!SearchQuery::MatchAll.is_statically_empty());
        assert!(!SearchQuery::plain("dune").is_statically_empty());
    }

    #[test]
    fn test_terms_lowercased() {
        let query = SearchQuery::plain("Dune  MESSIAH");
        assert_eq!(query.terms(), vec!["dune", "messiah"]);
        assert!(SearchQuery::MatchAll.terms().is_empty());
    }

    #[test]
    fn test_serialization_round_trip() {
        let query = SearchQuery::plain_with("desert planet", TermOperator::And);
        let json = serde_json::to_string(&query).unwrap();
        let back: SearchQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(query, back);
    }
}
