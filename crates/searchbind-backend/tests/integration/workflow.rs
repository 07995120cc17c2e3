//! End-to-end scenarios run against both backends.

use searchbind_backend::{rebuild, SearchBackend, SearchRequest};
use searchbind_query::{FilterNode, OrderDirective, SearchQuery, TermOperator};
use searchbind_schema::FieldValue;

use crate::common::{book, Harness};

fn ids(backend: &dyn SearchBackend, request: SearchRequest) -> Vec<String> {
    backend
        .search(request)
        .unwrap()
        .to_vec()
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect()
}

#[test]
fn plain_text_search_agrees_across_backends() {
    let harness = Harness::new();
    for backend in harness.backends() {
        let found = ids(backend, SearchRequest::new("book", SearchQuery::plain("desert")));
        assert_eq!(found, vec!["1", "2"], "backend {}", backend.name());

        let found = ids(
            backend,
            SearchRequest::new(
                "book",
                SearchQuery::plain_with("desert jihad", TermOperator::And),
            ),
        );
        assert_eq!(found, vec!["2"], "backend {}", backend.name());
    }
}

#[test]
fn prefix_search_only_matches_autocomplete_fields() {
    let harness = Harness::new();
    for backend in harness.backends() {
        let found = ids(backend, SearchRequest::new("book", SearchQuery::prefix("dun")));
        assert_eq!(found, vec!["1", "2"], "backend {}", backend.name());

        // "pilgrims" appears only in a body, which is not flagged for
        // autocomplete.
        let found = ids(backend, SearchRequest::new("book", SearchQuery::prefix("pilg")));
        assert!(found.is_empty(), "backend {}", backend.name());
    }
}

#[test]
fn filters_agree_across_backends() {
    let harness = Harness::new();
    let cases: Vec<(FilterNode, Vec<&str>)> = vec![
        (FilterNode::exact("genre", FieldValue::Str("fantasy".into())), vec!["4"]),
        (FilterNode::range("year", FieldValue::Int(1960), FieldValue::Int(1970)), vec!["1", "2", "3"]),
        (
            FilterNode::is_in(
                "genre",
                vec![FieldValue::Str("fantasy".into()), FieldValue::Str("mystery".into())],
            ),
            vec!["4"],
        ),
        (FilterNode::exact("author.country", FieldValue::Str("US".into())), vec!["1", "2", "5"]),
        (
            FilterNode::not(FilterNode::exact("author.country", FieldValue::Str("US".into()))),
            vec!["3", "4", "6"],
        ),
        (
            FilterNode::and(vec![
                FilterNode::gte("year", FieldValue::Int(1965)),
                FilterNode::or(vec![
                    FilterNode::exact("author.country", FieldValue::Str("US".into())),
                    FilterNode::exact("author.country", FieldValue::Str("RU".into())),
                ]),
            ]),
            vec!["1", "2", "5", "6"],
        ),
        (FilterNode::isnull("year", false), vec!["1", "2", "3", "4", "5", "6"]),
        (FilterNode::startswith("genre", FieldValue::Str("fan".into())), vec!["4"]),
    ];

    for (filter, expected) in cases {
        for backend in harness.backends() {
            let mut found = ids(
                backend,
                SearchRequest::new("book", SearchQuery::MatchAll).filter(filter.clone()),
            );
            found.sort();
            assert_eq!(found, expected, "filter {filter:?} on {}", backend.name());
        }
    }
}

#[test]
fn ordering_agrees_across_backends() {
    // The local backend has no native ordering, so this exercises the
    // post-hoc sort against the service's native sort.
    let harness = Harness::new();
    for backend in harness.backends() {
        let found = ids(
            backend,
            SearchRequest::new("book", SearchQuery::MatchAll)
                .order(OrderDirective::new().asc("year")),
        );
        assert_eq!(found, vec!["4", "3", "1", "2", "6", "5"], "backend {}", backend.name());

        let found = ids(
            backend,
            SearchRequest::new("book", SearchQuery::MatchAll)
                .order(OrderDirective::new().asc("genre").desc("year")),
        );
        assert_eq!(found, vec!["4", "5", "6", "2", "1", "3"], "backend {}", backend.name());
    }
}

#[test]
fn slicing_agrees_across_backends() {
    let harness = Harness::new();
    for backend in harness.backends() {
        let results = backend
            .search(
                SearchRequest::new("book", SearchQuery::MatchAll)
                    .order(OrderDirective::new().asc("year")),
            )
            .unwrap();

        assert_eq!(results.count().unwrap(), 6);
        let window = results.slice(2, Some(2));
        assert_eq!(window.count().unwrap(), 2, "backend {}", backend.name());
        let found: Vec<String> = window
            .to_vec()
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .collect();
        assert_eq!(found, vec!["1", "2"], "backend {}", backend.name());

        assert_eq!(results.slice(5, Some(3)).count().unwrap(), 1);
        assert!(results.slice(6, None).to_vec().unwrap().is_empty());
    }
}

#[test]
fn incremental_updates_propagate() {
    let harness = Harness::new();
    let updated = book("3", "Solaris Revised", "A new translation", 1961, "sf", "Lem", "PL");
    harness.source.insert(updated.clone());

    for backend in harness.backends() {
        backend.add(&updated).unwrap();
        assert_eq!(
            ids(backend, SearchRequest::new("book", SearchQuery::plain("translation"))),
            vec!["3"],
            "backend {}",
            backend.name()
        );

        backend.remove("book", "3").unwrap();
        assert!(
            ids(backend, SearchRequest::new("book", SearchQuery::plain("translation"))).is_empty(),
            "backend {}",
            backend.name()
        );
    }
}

#[test]
fn stale_hits_resolve_to_nothing() {
    let harness = Harness::new();
    // Remove from the source without telling the indexes.
    harness.source.remove("book", "1");
    for backend in harness.backends() {
        let found = ids(backend, SearchRequest::new("book", SearchQuery::plain("dune")));
        assert_eq!(found, vec!["2"], "backend {}", backend.name());
    }
}

#[test]
fn rebuild_resyncs_index_with_source() {
    let harness = Harness::new();
    harness.source.remove("book", "1");
    harness.source.remove("book", "2");
    harness
        .source
        .insert(book("7", "Foundation", "Psychohistory", 1951, "sf", "Asimov", "US"));

    for backend in harness.backends() {
        let stats = rebuild(backend).unwrap();
        assert_eq!(stats.indexed, 5, "backend {}", backend.name());

        assert!(ids(backend, SearchRequest::new("book", SearchQuery::plain("dune"))).is_empty());
        assert_eq!(
            ids(backend, SearchRequest::new("book", SearchQuery::plain("foundation"))),
            vec!["7"],
            "backend {}",
            backend.name()
        );
    }

    // The service rebuild retired the old generation.
    assert_eq!(harness.transport.index_keys().len(), 1);
}

#[test]
fn subtype_requests_hit_the_ancestor_index() {
    let harness = Harness::new();
    for backend in harness.backends() {
        let found = ids(backend, SearchRequest::new("novel", SearchQuery::plain("solaris")));
        assert_eq!(found, vec!["3"], "backend {}", backend.name());
    }
}

#[test]
fn empty_query_short_circuits_without_requests() {
    let harness = Harness::new();
    let before = harness.transport.request_count();
    let results = harness
        .service
        .search(SearchRequest::new("book", SearchQuery::plain("  ")))
        .unwrap();
    assert_eq!(results.count().unwrap(), 0);
    assert!(results.to_vec().unwrap().is_empty());
    assert_eq!(harness.transport.request_count(), before);
}

#[test]
fn lookup_support_differs_by_backend() {
    let harness = Harness::new();
    let request = SearchRequest::new("book", SearchQuery::MatchAll)
        .filter(FilterNode::contains("genre", FieldValue::Str("f".into())));

    let mut found = ids(&harness.local, request.clone());
    found.sort();
    assert_eq!(found, vec!["1", "2", "3", "4", "5", "6"]);

    assert!(harness.service.search(request).unwrap_err().is_configuration());
}
