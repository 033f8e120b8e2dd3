//! Secret-aware sinks
//!
//! Resolved inputs, application settings and stack exports are emitted
//! through a [`SecretSink`]. Sinks receive [`PropertyValue`]s, so they always
//! know whether a value may be shown.

use crate::resource::PropertyValue;
use std::sync::Mutex;

pub trait SecretSink: Send + Sync {
    fn write(&self, key: &str, value: &PropertyValue);
}

/// Writes values to `tracing` at debug level, secrets redacted
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl SecretSink for TracingSink {
    fn write(&self, key: &str, value: &PropertyValue) {
        tracing::debug!(key = %key, value = %value, secret = value.is_secret(), "property");
    }
}

/// Keeps every written value in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(String, PropertyValue)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, PropertyValue)> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Last value written under `key`
    pub fn get(&self, key: &str) -> Option<PropertyValue> {
        self.entries()
            .into_iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl SecretSink for MemorySink {
    fn write(&self, key: &str, value: &PropertyValue) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((key.to_string(), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::REDACTED;
    use serde_json::json;

    #[test]
    fn test_memory_sink_keeps_taint() {
        let sink = MemorySink::new();
        sink.write("app.siteConfig", &PropertyValue::new(json!("k1"), true));
        sink.write("app.kind", &PropertyValue::new(json!("FunctionApp"), false));

        let secret = sink.get("app.siteConfig").unwrap();
        assert!(secret.is_secret());
        assert_eq!(secret.to_string(), REDACTED);
        assert_eq!(sink.get("app.kind").unwrap().to_string(), "FunctionApp");
        assert_eq!(sink.entries().len(), 2);
    }
}
