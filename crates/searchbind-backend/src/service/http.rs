//! HTTP transport for the service backend.
//!
//! Speaks the document service's REST API over a blocking reqwest client.
//! Only compiled in with the `service-http` feature; everything above the
//! transport is exercised against [`MockTransport`](super::transport::MockTransport)
//! instead.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use searchbind_core::{Error, Result};

use crate::index::BulkOutcome;

use super::transport::Transport;

/// Blocking HTTP implementation of [`Transport`].
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Connect to a service at `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn expect_ok(response: reqwest::blocking::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|err| Error::transport(format!("malformed service response: {err}")))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::transport(format!("service returned {status}: {body}")))
        }
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .map_err(|err| Error::transport(format!("request failed: {err}")))?;
        Self::expect_ok(response)
    }
}

/// Serialize documents into the service's newline-delimited bulk format.
fn bulk_payload(docs: &[(String, Value)]) -> String {
    let mut payload = String::new();
    for (id, doc) in docs {
        payload.push_str(&json!({ "index": { "_id": id } }).to_string());
        payload.push('\n');
        payload.push_str(&doc.to_string());
        payload.push('\n');
    }
    payload
}

/// Per-document outcomes from a bulk response's `items` array.
fn bulk_outcomes(response: &Value) -> Result<Vec<BulkOutcome>> {
    let items = response
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::transport("malformed bulk response: missing items"))?;
    items
        .iter()
        .map(|item| {
            let entry = item
                .get("index")
                .ok_or_else(|| Error::transport("malformed bulk response item"))?;
            let id = entry
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::transport("bulk response item without _id"))?;
            Ok(match entry.get("error") {
                Some(error) => BulkOutcome::failed(id, error.to_string()),
                None => BulkOutcome::ok(id),
            })
        })
        .collect()
}

impl Transport for HttpTransport {
    fn create_index(&self, key: &str, body: &Value) -> Result<()> {
        self.send(self.client.put(self.url(key)).json(body))?;
        Ok(())
    }

    fn delete_index(&self, key: &str) -> Result<()> {
        self.send(self.client.delete(self.url(key)))?;
        Ok(())
    }

    fn index_documents(&self, key: &str, docs: &[(String, Value)]) -> Result<Vec<BulkOutcome>> {
        let response = self.send(
            self.client
                .post(self.url(&format!("{key}/_bulk")))
                .header("content-type", "application/x-ndjson")
                .body(bulk_payload(docs)),
        )?;
        bulk_outcomes(&response)
    }

    fn delete_document(&self, key: &str, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("{key}/_doc/{id}")))
            .send()
            .map_err(|err| Error::transport(format!("request failed: {err}")))?;
        // Deleting an unindexed document is a no-op.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_ok(response)?;
        Ok(())
    }

    fn refresh_index(&self, key: &str) -> Result<()> {
        self.send(self.client.post(self.url(&format!("{key}/_refresh"))))?;
        Ok(())
    }

    fn search(&self, key: &str, body: &Value) -> Result<Value> {
        self.send(self.client.post(self.url(&format!("{key}/_search"))).json(body))
    }

    fn count(&self, key: &str, body: &Value) -> Result<u64> {
        let response =
            self.send(self.client.post(self.url(&format!("{key}/_count"))).json(body))?;
        response
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::transport("malformed count response"))
    }

    fn update_alias(&self, alias: &str, add_key: &str, remove_keys: &[String]) -> Result<()> {
        let mut actions: Vec<Value> = remove_keys
            .iter()
            .map(|key| json!({ "remove": { "index": key, "alias": alias } }))
            .collect();
        actions.push(json!({ "add": { "index": add_key, "alias": alias } }));
        self.send(
            self.client
                .post(self.url("_aliases"))
                .json(&json!({ "actions": actions })),
        )?;
        Ok(())
    }

    fn indexes_for_alias(&self, alias: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.url(&format!("_alias/{alias}")))
            .send()
            .map_err(|err| Error::transport(format!("request failed: {err}")))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body = Self::expect_ok(response)?;
        let keys = body
            .as_object()
            .ok_or_else(|| Error::transport("malformed alias response"))?;
        Ok(keys.keys().cloned().collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
