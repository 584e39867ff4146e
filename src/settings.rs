// Application settings

use std::collections::HashMap;

use serde_json::Value;

/// Flat string-keyed settings with typed accessors.
///
/// Every key ships with a default; `set` overrides it. Values are JSON
/// so settings files and programmatic configuration share one shape.
#[derive(Debug, Clone)]
pub struct Settings {
    values: HashMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert("debug".to_string(), Value::Bool(false));
        values.insert("testing".to_string(), Value::Bool(false));
        values.insert(
            "default_content_type".to_string(),
            Value::String("application/json".to_string()),
        );
        values.insert(
            "default_encoding".to_string(),
            Value::String("utf-8".to_string()),
        );
        values.insert("set_accept_from_ext".to_string(), Value::Bool(true));
        values.insert(
            "tunnel_over_post".to_string(),
            Value::String("DELETE,PUT,PATCH".to_string()),
        );
        values.insert("csrf.enabled".to_string(), Value::Bool(false));
        values.insert("cors.enabled".to_string(), Value::Bool(false));
        Self { values }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::Bool(true)))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Comma-separated string setting as a list of trimmed entries.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get_str(key)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
