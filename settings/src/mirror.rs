//! Local mirror of one remote configuration value.
//!
//! A [`ConfigMirror`] binds a (section, key) pair of a settings session to
//! a cached local value. The cache is what callers render; the remote store
//! stays authoritative and is re-read opportunistically, never polled.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::ServiceError;

/// Configuration scalar. The store only ever carries strings and integers;
/// anything else reads back as `Null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    String(String),
    Integer(i64),
}

impl ConfigValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => ConfigValue::String(s.clone()),
            Value::Number(n) => ConfigValue::Integer(n.as_i64().unwrap_or(-1)),
            _ => ConfigValue::Null,
        }
    }

    /// Serialize into the store's wire form: a quoted JSON string with
    /// integers rendered as decimal text.
    pub fn to_wire(&self) -> String {
        match self {
            ConfigValue::String(s) => format!("\"{}\"", s),
            ConfigValue::Integer(n) => format!("\"{}\"", n),
            ConfigValue::Null => "\"\"".to_string(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null => Ok(()),
            ConfigValue::String(s) => write!(f, "{}", s),
            ConfigValue::Integer(n) => write!(f, "{}", n),
        }
    }
}

/// One `{Value, Text}` pair from an enumerated remote option set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub value: ConfigValue,
    pub text: String,
}

/// Remote key/value store operations the mirror depends on.
///
/// Implemented by [`crate::confd::Session`] against the live daemon and by
/// mocks in tests.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Raw JSON-scalar payload of one key.
    async fn get_key(&self, section: &str, key: &str) -> Result<String, ServiceError>;

    /// Write the JSON payload of one key.
    async fn set_key(&self, section: &str, key: &str, json: &str) -> Result<(), ServiceError>;

    /// Raw JSON array of `{Value, Text}` choices for an enumerated key.
    async fn get_available_values(&self, section: &str, key: &str)
        -> Result<String, ServiceError>;

    /// Currently advertised sections.
    async fn available_sections(&self) -> Result<Vec<String>, ServiceError>;

    /// Currently advertised keys of one section.
    async fn available_keys(&self, section: &str) -> Result<Vec<String>, ServiceError>;

    /// Whether the store flags the pair with a validation error.
    async fn has_value_error(&self, section: &str, key: &str) -> Result<bool, ServiceError>;
}

/// Mirrors one (section, key) pair into a cached local value.
pub struct ConfigMirror {
    store: Arc<dyn ConfigStore>,
    section: String,
    key: String,
    cache: Mutex<ConfigValue>,
    always_update: bool,
    force_write: bool,
}

impl ConfigMirror {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        section: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            section: section.into(),
            key: key.into(),
            cache: Mutex::new(ConfigValue::Null),
            always_update: false,
            force_write: false,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn always_update(&self) -> bool {
        self.always_update
    }

    /// Refresh the cache on every data-changed notification while visible.
    pub fn set_always_update(&mut self, always_update: bool) {
        self.always_update = always_update;
    }

    pub fn force_write(&self) -> bool {
        self.force_write
    }

    /// Push every write to the store even when the cache is clean.
    pub fn set_force_write(&mut self, force_write: bool) {
        self.force_write = force_write;
    }

    /// Current cached value (`Null` until first adoption).
    pub fn cached(&self) -> ConfigValue {
        self.cache.lock().unwrap().clone()
    }

    /// Adopt `value` into the cache. Returns true when the cache changed.
    pub fn set_cache(&self, value: ConfigValue) -> bool {
        let mut cache = self.cache.lock().unwrap();
        if *cache == value {
            return false;
        }
        *cache = value;
        true
    }

    /// Explicit dirty comparison against the cache.
    pub fn is_dirty(&self, value: &ConfigValue) -> bool {
        *self.cache.lock().unwrap() != *value
    }

    /// Fetch the remote value without touching the cache.
    pub async fn read(&self) -> Result<ConfigValue, ServiceError> {
        let raw = self.store.get_key(&self.section, &self.key).await?;
        Ok(parse_scalar(&raw))
    }

    /// Fetch the remote value and adopt it into the cache.
    pub async fn refresh(&self) -> Result<ConfigValue, ServiceError> {
        let value = self.read().await?;
        self.set_cache(value.clone());
        Ok(value)
    }

    /// Write `value` to the store when dirty, remotely flagged as
    /// erroneous, or forced.
    ///
    /// The cache adopts `value` unconditionally afterwards, even when the
    /// remote write failed. That weak consistency is deliberate; the next
    /// visibility refresh re-reads the authoritative value.
    pub async fn write(&self, value: ConfigValue) -> Result<(), ServiceError> {
        let value_error = match self.store.has_value_error(&self.section, &self.key).await {
            Ok(flagged) => flagged,
            Err(e) => {
                warn!(
                    "could not query value errors for {}/{}: {}",
                    self.section, self.key, e
                );
                false
            }
        };

        let mut result = Ok(());
        if self.is_dirty(&value) || value_error || self.force_write {
            let wire = value.to_wire();
            debug!("SetKey {}/{} = {}", self.section, self.key, wire);
            result = self.store.set_key(&self.section, &self.key, &wire).await;
            if let Err(e) = &result {
                warn!(
                    "SetKey {}/{} failed, cache keeps the written value: {}",
                    self.section, self.key, e
                );
            }
        }

        self.set_cache(value);
        result
    }

    /// Whether the pair is currently advertised by the store. Recomputed on
    /// demand; callers re-invoke on the availability-changed signals.
    pub async fn visible(&self) -> bool {
        let sections = match self.store.available_sections().await {
            Ok(sections) => sections,
            Err(e) => {
                warn!("could not query available sections: {}", e);
                return false;
            }
        };
        if !sections.iter().any(|s| s == &self.section) {
            return false;
        }

        match self.store.available_keys(&self.section).await {
            Ok(keys) => keys.iter().any(|k| k == &self.key),
            Err(e) => {
                warn!(
                    "could not query available keys of '{}': {}",
                    self.section, e
                );
                false
            }
        }
    }

    /// Visibility-show hook: refresh a null cache (or always, in
    /// always-update mode), otherwise serve the cache.
    pub async fn shown(&self) -> Result<ConfigValue, ServiceError> {
        if self.cached().is_null() || self.always_update {
            self.refresh().await
        } else {
            Ok(self.cached())
        }
    }

    /// Data-changed hook: refresh only while visible and in always-update
    /// mode. Fields without always-update pick the change up lazily on the
    /// next show.
    pub async fn data_changed(&self) -> Result<(), ServiceError> {
        if self.always_update && self.visible().await {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Ordered `{Value, Text}` choices for an enumerated field.
    pub async fn available_values(&self) -> Result<Vec<Choice>, ServiceError> {
        let raw = self
            .store
            .get_available_values(&self.section, &self.key)
            .await?;
        let parsed: Value = serde_json::from_str(&raw)?;

        let mut choices = Vec::new();
        if let Value::Array(items) = parsed {
            for item in items {
                let value = item
                    .get("Value")
                    .map(ConfigValue::from_json)
                    .unwrap_or(ConfigValue::Null);
                let text = item
                    .get("Text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                choices.push(Choice { value, text });
            }
        }

        Ok(choices)
    }

    /// Index of the cached value within `choices`. Linear scan, first match
    /// wins; `None` on no match or a null cache.
    pub fn cached_index(&self, choices: &[Choice]) -> Option<usize> {
        let cached = self.cached();
        if cached.is_null() {
            return None;
        }
        choices.iter().position(|choice| choice.value == cached)
    }

    /// Display text of the cached value within `choices`; empty on no
    /// match.
    pub fn cached_text(&self, choices: &[Choice]) -> String {
        self.cached_index(choices)
            .map(|i| choices[i].text.clone())
            .unwrap_or_default()
    }
}

/// Parse one JSON-scalar payload from the store. Empty or malformed
/// payloads read back as `Null`, matching the store's own null semantics.
fn parse_scalar(raw: &str) -> ConfigValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ConfigValue::Null;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ConfigValue::from_json(&value),
        Err(e) => {
            debug!("unparseable config payload '{}': {}", raw, e);
            ConfigValue::Null
        }
    }
}
