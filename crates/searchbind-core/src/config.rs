//! Per-backend configuration.
//!
//! Each named backend instance is configured with a [`BackendSettings`]
//! value, typically deserialized from the host application's configuration
//! file. Unknown concerns are passed through opaquely: `options` goes to the
//! backend implementation untouched, and `index_settings` is merged
//! recursively over the backend's built-in index defaults with
//! [`merge_settings`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration for one named backend instance.
///
/// All fields other than `backend` have defaults, so a minimal configuration
/// is just `{"backend": "local"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Backend implementation selector: `"local"` or `"service"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Whether record mutations should be pushed to the index as they
    /// happen. Hosts consult this flag before calling `add`/`delete` from
    /// their mutation paths.
    #[serde(default = "default_true")]
    pub auto_update: bool,

    /// Whether full rebuilds use the shadow-index-and-alias-swap strategy.
    #[serde(default = "default_true")]
    pub atomic_rebuild: bool,

    /// Namespace prefix for physical index names. Two applications sharing
    /// one search service must use distinct prefixes.
    #[serde(default = "default_prefix")]
    pub index_prefix: String,

    /// Base URL of the external search service, for backends that need one.
    pub url: Option<String>,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether failures while indexing individual records are logged and
    /// swallowed rather than raised. Swallowing is the default so that an
    /// interruption in search service does not break unrelated application
    /// writes.
    #[serde(default = "default_true")]
    pub catch_indexing_errors: bool,

    /// Backend-specific pass-through options. Never interpreted by the core.
    #[serde(default)]
    pub options: Map<String, Value>,

    /// Backend-specific index settings, merged recursively over the
    /// backend's defaults (see [`merge_settings`]).
    #[serde(default)]
    pub index_settings: Map<String, Value>,
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_true() -> bool {
    true
}

fn default_prefix() -> String {
    "searchbind".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            auto_update: default_true(),
            atomic_rebuild: default_true(),
            index_prefix: default_prefix(),
            url: None,
            timeout_secs: default_timeout_secs(),
            catch_indexing_errors: default_true(),
            options: Map::new(),
            index_settings: Map::new(),
        }
    }
}

impl BackendSettings {
    /// The per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the effective index settings by merging the configured
    /// overrides over the given backend defaults.
    pub fn resolved_index_settings(&self, defaults: &Value) -> Value {
        merge_settings(defaults, &Value::Object(self.index_settings.clone()))
    }
}

/// Merge `overrides` over `defaults`, recursively.
///
/// Object values merge key-wise; any non-object value in `overrides`
/// replaces the default outright. Keys present only in `defaults` are kept.
pub fn merge_settings(defaults: &Value, overrides: &Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(base), Value::Object(over)) => {
            let mut merged = base.clone();
            for (key, value) in over {
                let entry = match merged.get(key) {
                    Some(existing) => merge_settings(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (_, replacement) => replacement.clone(),
    }
}

// ============================================================================
// Tests
// ============================================================================
