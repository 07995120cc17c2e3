//! The service wire protocol.
//!
//! [`Transport`] abstracts every operation the service backend performs
//! against the remote document service, so the backend's own logic can be
//! tested without a network. [`MockTransport`] is a faithful in-memory
//! service: it stores documents, resolves aliases, and evaluates the JSON
//! search DSL itself, independently of the code that rendered it. Tests
//! comparing its answers against the local backend therefore exercise the
//! whole compile-render-execute pipeline, not a mirror of it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, RwLock};

use serde_json::{json, Value};

use searchbind_core::{Error, Result};

use crate::index::BulkOutcome;

/// Operations the service backend performs against the remote service.
///
/// Every method maps to one request; implementations surface protocol and
/// connectivity failures as [`Error::Transport`].
pub trait Transport: Send + Sync {
    /// Create an index. Fails if an index with this key already exists.
    fn create_index(&self, key: &str, body: &Value) -> Result<()>;

    /// Delete an index and everything in it.
    fn delete_index(&self, key: &str) -> Result<()>;

    /// Bulk-store documents as `(id, doc)` pairs, replacing existing ids.
    fn index_documents(&self, key: &str, docs: &[(String, Value)]) -> Result<Vec<BulkOutcome>>;

    /// Delete one document. Deleting an absent document is a no-op.
    fn delete_document(&self, key: &str, id: &str) -> Result<()>;

    /// Make pending writes visible to search.
    fn refresh_index(&self, key: &str) -> Result<()>;

    /// Run a search body, returning the service's hit envelope.
    fn search(&self, key: &str, body: &Value) -> Result<Value>;

    /// Run a count body, returning the total match count.
    fn count(&self, key: &str, body: &Value) -> Result<u64>;

    /// Atomically repoint an alias: add it to `add_key` and drop it from
    /// `remove_keys` in one operation.
    fn update_alias(&self, alias: &str, add_key: &str, remove_keys: &[String]) -> Result<()>;

    /// Concrete index keys the alias currently points at.
    fn indexes_for_alias(&self, alias: &str) -> Result<Vec<String>>;
}

/// In-memory stand-in for the document service.
#[derive(Default)]
pub struct MockTransport {
    indexes: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
    aliases: RwLock<BTreeMap<String, String>>,
    requests: AtomicUsize,
    searches: AtomicUsize,
    fail_next: Mutex<Option<String>>,
}

impl MockTransport {
    /// An empty mock service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requests served, searches and counts included.
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    /// Search and count requests served.
    pub fn search_count(&self) -> usize {
        self.searches.load(AtomicOrdering::SeqCst)
    }

    /// Fail the next request with a transport error carrying `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock().expect("fail flag lock poisoned") = Some(message.into());
    }

    /// Names of all concrete indexes, for test assertions.
    pub fn index_keys(&self) -> Vec<String> {
        self.indexes
            .read()
            .expect("mock index lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of documents in an index (alias or concrete key).
    pub fn doc_count(&self, key: &str) -> usize {
        let key = self.resolve(key);
        self.indexes
            .read()
            .expect("mock index lock poisoned")
            .get(&key)
            .map_or(0, BTreeMap::len)
    }

    fn begin_request(&self) -> Result<()> {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(message) = self.fail_next.lock().expect("fail flag lock poisoned").take() {
            return Err(Error::transport(message));
        }
        Ok(())
    }

    fn resolve(&self, key: &str) -> String {
        self.aliases
            .read()
            .expect("mock alias lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn matches(&self, key: &str, body: &Value) -> Result<Vec<(String, f64)>> {
        let key = self.resolve(key);
        let indexes = self.indexes.read().expect("mock index lock poisoned");
        let index = indexes
            .get(&key)
            .ok_or_else(|| Error::transport(format!("no such index '{key}'")))?;

        let query = body
            .get("query")
            .ok_or_else(|| Error::transport("search body has no query"))?;

        let mut out = Vec::new();
        for (id, doc) in index {
            if let Some(score) = eval_query(query, doc)? {
                out.push((id.clone(), score));
            }
        }

        if let Some(sort) = body.get("sort").and_then(Value::as_array) {
            sort_matches(&mut out, sort, index);
        } else {
            // Native order: score descending, id ascending for ties.
            out.sort_by(|(a_id, a), (b_id, b)| b.total_cmp(a).then_with(|| a_id.cmp(b_id)));
        }
        Ok(out)
    }
}

impl Transport for MockTransport {
    fn create_index(&self, key: &str, _body: &Value) -> Result<()> {
        self.begin_request()?;
        let mut indexes = self.indexes.write().expect("mock index lock poisoned");
        if indexes.contains_key(key) {
            return Err(Error::transport(format!("index '{key}' already exists")));
        }
        indexes.insert(key.to_string(), BTreeMap::new());
        Ok(())
    }

    fn delete_index(&self, key: &str) -> Result<()> {
        self.begin_request()?;
        let key = self.resolve(key);
        self.indexes
            .write()
            .expect("mock index lock poisoned")
            .remove(&key)
            .ok_or_else(|| Error::transport(format!("no such index '{key}'")))?;
        Ok(())
    }

    fn index_documents(&self, key: &str, docs: &[(String, Value)]) -> Result<Vec<BulkOutcome>> {
        self.begin_request()?;
        let key = self.resolve(key);
        let mut indexes = self.indexes.write().expect("mock index lock poisoned");
        let index = indexes
            .get_mut(&key)
            .ok_or_else(|| Error::transport(format!("no such index '{key}'")))?;
        Ok(docs
            .iter()
            .map(|(id, doc)| {
                index.insert(id.clone(), doc.clone());
                BulkOutcome::ok(id)
            })
            .collect())
    }

    fn delete_document(&self, key: &str, id: &str) -> Result<()> {
        self.begin_request()?;
        let key = self.resolve(key);
        if let Some(index) = self
            .indexes
            .write()
            .expect("mock index lock poisoned")
            .get_mut(&key)
        {
            index.remove(id);
        }
        Ok(())
    }

    fn refresh_index(&self, key: &str) -> Result<()> {
        self.begin_request()?;
        let key = self.resolve(key);
        if !self
            .indexes
            .read()
            .expect("mock index lock poisoned")
            .contains_key(&key)
        {
            return Err(Error::transport(format!("no such index '{key}'")));
        }
        Ok(())
    }

    fn search(&self, key: &str, body: &Value) -> Result<Value> {
        self.begin_request()?;
        self.searches.fetch_add(1, AtomicOrdering::SeqCst);

        let matches = self.matches(key, body)?;
        let total = matches.len();
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).map(|s| s as usize);

        let window = matches.into_iter().skip(from);
        let window: Vec<(String, f64)> = match size {
            Some(size) => window.take(size).collect(),
            None => window.collect(),
        };
        let hits: Vec<Value> = window
            .into_iter()
            .map(|(id, score)| json!({ "_id": id, "_score": score }))
            .collect();

        Ok(json!({ "hits": { "total": { "value": total }, "hits": hits } }))
    }

    fn count(&self, key: &str, body: &Value) -> Result<u64> {
        self.begin_request()?;
        self.searches.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(self.matches(key, body)?.len() as u64)
    }

    fn update_alias(&self, alias: &str, add_key: &str, remove_keys: &[String]) -> Result<()> {
        self.begin_request()?;
        let mut aliases = self.aliases.write().expect("mock alias lock poisoned");
        match aliases.get(alias) {
            Some(current) if !remove_keys.contains(current) && current != add_key => {
                return Err(Error::transport(format!(
                    "alias '{alias}' points at '{current}', not at a removed key"
                )));
            }
            _ => {}
        }
        aliases.insert(alias.to_string(), add_key.to_string());
        Ok(())
    }

    fn indexes_for_alias(&self, alias: &str) -> Result<Vec<String>> {
        self.begin_request()?;
        Ok(self
            .aliases
            .read()
            .expect("mock alias lock poisoned")
            .get(alias)
            .cloned()
            .into_iter()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// DSL evaluation
// ---------------------------------------------------------------------------

/// Evaluate one query node against a document. `Some(score)` on match.
fn eval_query(query: &Value, doc: &Value) -> Result<Option<f64>> {
    let object = query
        .as_object()
        .ok_or_else(|| Error::transport(format!("malformed query node: {query}")))?;
    let (kind, body) = object
        .iter()
        .next()
        .ok_or_else(|| Error::transport("empty query node"))?;

    match kind.as_str() {
        "match_all" => Ok(Some(1.0)),
        "match_none" => Ok(None),
        "bool" => eval_bool(body, doc),
        "term" => Ok(eval_term(body, doc)?.then_some(1.0)),
        "terms" => Ok(eval_terms(body, doc)?.then_some(1.0)),
        "range" => Ok(eval_range(body, doc)?.then_some(1.0)),
        "prefix" => Ok(eval_prefix(body, doc)?.then_some(1.0)),
        "exists" => {
            let path = body
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::transport("exists query without a field"))?;
            Ok((!leaves(doc, path).is_empty()).then_some(1.0))
        }
        "multi_match" => eval_multi_match(body, doc),
        other => Err(Error::transport(format!("unknown query kind '{other}'"))),
    }
}

fn clause<'a>(body: &'a Value, name: &str) -> &'a [Value] {
    body.get(name).and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

fn eval_bool(body: &Value, doc: &Value) -> Result<Option<f64>> {
    let mut score = 0.0;

    for node in clause(body, "must") {
        match eval_query(node, doc)? {
            Some(s) => score += s,
            None => return Ok(None),
        }
    }
    for node in clause(body, "filter") {
        if eval_query(node, doc)?.is_none() {
            return Ok(None);
        }
    }
    for node in clause(body, "must_not") {
        if eval_query(node, doc)?.is_some() {
            return Ok(None);
        }
    }
    let should = clause(body, "should");
    if !should.is_empty() {
        let mut matched = 0_usize;
        for node in should {
            if let Some(s) = eval_query(node, doc)? {
                matched += 1;
                score += s;
            }
        }
        let minimum = body
            .get("minimum_should_match")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        if matched < minimum {
            return Ok(None);
        }
    }
    Ok(Some(score))
}

fn single_entry(body: &Value) -> Result<(&String, &Value)> {
    body.as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| Error::transport(format!("malformed leaf clause: {body}")))
}

fn eval_term(body: &Value, doc: &Value) -> Result<bool> {
    let (path, expected) = single_entry(body)?;
    Ok(leaves(doc, path).iter().any(|v| json_eq(v, expected)))
}

fn eval_terms(body: &Value, doc: &Value) -> Result<bool> {
    let (path, expected) = single_entry(body)?;
    let expected = expected
        .as_array()
        .ok_or_else(|| Error::transport("terms clause without a value list"))?;
    Ok(leaves(doc, path)
        .iter()
        .any(|v| expected.iter().any(|e| json_eq(v, e))))
}

fn eval_range(body: &Value, doc: &Value) -> Result<bool> {
    let (path, bounds) = single_entry(body)?;
    let bounds = bounds
        .as_object()
        .ok_or_else(|| Error::transport("range clause without bounds"))?;
    Ok(leaves(doc, path).iter().any(|v| {
        bounds.iter().all(|(op, bound)| {
            let Some(ord) = json_cmp(v, bound) else {
                return false;
            };
            match op.as_str() {
                "gt" => ord.is_gt(),
                "gte" => ord.is_ge(),
                "lt" => ord.is_lt(),
                "lte" => ord.is_le(),
                _ => false,
            }
        })
    }))
}

fn eval_prefix(body: &Value, doc: &Value) -> Result<bool> {
    let (path, expected) = single_entry(body)?;
    let Some(prefix) = expected.as_str() else {
        return Ok(false);
    };
    Ok(leaves(doc, path)
        .iter()
        .any(|v| v.as_str().is_some_and(|s| s.starts_with(prefix))))
}

fn eval_multi_match(body: &Value, doc: &Value) -> Result<Option<f64>> {
    let text = body
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::transport("multi_match without query text"))?;
    let fields = body
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::transport("multi_match without fields"))?;
    let prefix = body.get("type").and_then(Value::as_str) == Some("phrase_prefix");
    let require_all =
        prefix || body.get("operator").and_then(Value::as_str) == Some("and");

    let terms: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return Ok(None);
    }

    let mut score = 0.0_f64;
    let mut matched_terms = 0_usize;
    for term in &terms {
        let mut term_score = 0.0_f64;
        for field in fields {
            let Some(field) = field.as_str() else { continue };
            let (path, boost) = match field.split_once('^') {
                Some((path, boost)) => (path, boost.parse::<f64>().unwrap_or(1.0)),
                None => (field, 1.0),
            };
            for leaf in leaves(doc, path) {
                let Some(text) = leaf.as_str() else { continue };
                let occurrences = text
                    .split_whitespace()
                    .filter(|word| {
                        let word = word.to_lowercase();
                        if prefix {
                            word.starts_with(term.as_str())
                        } else {
                            word == *term
                        }
                    })
                    .count();
                term_score += occurrences as f64 * boost;
            }
        }
        if term_score > 0.0 {
            matched_terms += 1;
            score += term_score;
        }
    }

    let matched = if require_all {
        matched_terms == terms.len()
    } else {
        matched_terms > 0
    };
    Ok(matched.then_some(score))
}

/// All scalar values reachable at a dotted path, fanning out through
/// arrays.
fn leaves<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    fn walk<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    walk(item, segments, out);
                }
            }
            Value::Object(map) => {
                if let Some((head, rest)) = segments.split_first() {
                    if let Some(next) = map.get(*head) {
                        walk(next, rest, out);
                    }
                }
            }
            scalar => {
                if segments.is_empty() && !scalar.is_null() {
                    out.push(scalar);
                }
            }
        }
    }
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    walk(doc, &segments, &mut out);
    out
}

fn json_eq(a: &Value, b: &Value) -> bool {
    json_cmp(a, b) == Some(std::cmp::Ordering::Equal)
}

/// Order two scalars, coercing numeric kinds. `None` for incomparable
/// shapes.
fn json_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn sort_matches(
    matches: &mut [(String, f64)],
    sort: &[Value],
    index: &BTreeMap<String, Value>,
) {
    matches.sort_by(|(a_id, _), (b_id, _)| {
        for entry in sort {
            let Some((path, spec)) = entry.as_object().and_then(|o| o.iter().next()) else {
                continue;
            };
            let descending = spec.get("order").and_then(Value::as_str) == Some("desc");
            let a_value = index.get(a_id).map(|d| leaves(d, path)).unwrap_or_default();
            let b_value = index.get(b_id).map(|d| leaves(d, path)).unwrap_or_default();
            let ordering = match (a_value.first(), b_value.first()) {
                (Some(a), Some(b)) => json_cmp(a, b).unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            };
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        a_id.cmp(b_id)
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MockTransport {
        let transport = MockTransport::new();
        transport.create_index("books", &json!({})).unwrap();
        transport
            .index_documents(
                "books",
                &[
                    (
                        "1".into(),
                        json!({ "title": "Dune", "year": 1965, "author": { "name": "Herbert" } }),
                    ),
                    (
                        "2".into(),
                        json!({ "title": "Dune Messiah", "year": 1969, "author": { "name": "Herbert" } }),
                    ),
                    (
                        "3".into(),
                        json!({ "title": "Hyperion", "year": 1989, "author": { "name": "Simmons" } }),
                    ),
                ],
            )
            .unwrap();
        transport
    }

    fn hit_ids(response: &Value) -> Vec<&str> {
        response["hits"]["hits"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["_id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_term_and_nested_paths() {
        let transport = seeded();
        let response = transport
            .search("books", &json!({ "query": { "term": { "author.name": "Herbert" } } }))
            .unwrap();
        assert_eq!(hit_ids(&response), vec!["1", "2"]);
    }

    #[test]
    fn test_bool_filter_and_range() {
        let transport = seeded();
        let body = json!({
            "query": {
                "bool": {
                    "must": [{ "match_all": {} }],
                    "filter": [{ "range": { "year": { "gte": 1969 } } }],
                }
            }
        });
        let response = transport.search("books", &body).unwrap();
        assert_eq!(hit_ids(&response), vec!["2", "3"]);
        assert_eq!(transport.count("books", &body).unwrap(), 2);
    }

    #[test]
    fn test_multi_match_scoring_and_order() {
        let transport = seeded();
        let response = transport
            .search(
                "books",
                &json!({
                    "query": {
                        "multi_match": {
                            "query": "dune messiah",
                            "fields": ["title^2"],
                            "operator": "or",
                        }
                    }
                }),
            )
            .unwrap();
        // Two matched terms outrank one; ties would fall back to id order.
        assert_eq!(hit_ids(&response), vec!["2", "1"]);
    }

    #[test]
    fn test_sort_and_window() {
        let transport = seeded();
        let body = json!({
            "query": { "match_all": {} },
            "sort": [{ "year": { "order": "desc" } }],
            "from": 1,
            "size": 1,
        });
        let response = transport.search("books", &body).unwrap();
        assert_eq!(hit_ids(&response), vec!["2"]);
        assert_eq!(response["hits"]["total"]["value"], json!(3));
    }

    #[test]
    fn test_alias_resolution_and_atomic_repoint() {
        let transport = seeded();
        transport.update_alias("live", "books", &[]).unwrap();
        assert_eq!(transport.doc_count("live"), 3);

        transport.create_index("books_v2", &json!({})).unwrap();
        transport
            .index_documents("books_v2", &[("9".into(), json!({ "title": "Solaris" }))])
            .unwrap();
        transport
            .update_alias("live", "books_v2", &["books".to_string()])
            .unwrap();
        assert_eq!(transport.doc_count("live"), 1);
        assert_eq!(transport.indexes_for_alias("live").unwrap(), vec!["books_v2"]);
    }

    #[test]
    fn test_injected_failure() {
        let transport = seeded();
        transport.fail_next("connection reset");
        let err = transport
            .search("books", &json!({ "query": { "match_all": {} } }))
            .unwrap_err();
        assert!(err.is_transport());
        // The next request succeeds again.
        assert!(transport.search("books", &json!({ "query": { "match_all": {} } })).is_ok());
    }

    #[test]
    fn test_request_counters() {
        let transport = seeded();
        let before = transport.request_count();
        transport.refresh_index("books").unwrap();
        transport.count("books", &json!({ "query": { "match_all": {} } })).unwrap();
        assert_eq!(transport.request_count(), before + 2);
        assert_eq!(transport.search_count(), 1);
    }

    #[test]
    fn test_create_existing_index_rejected() {
        let transport = seeded();
        assert!(transport.create_index("books", &json!({})).unwrap_err().is_transport());
    }
}
