//! Component configuration properties
//!
//! Key-value configuration handed to a component's `on_configure` callback.
//! The same map is kept by the instance so `reset` can reconfigure with it.

use crate::error::{RoboportError, RoboportResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Typed view over a component's configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentConfig {
    values: BTreeMap<String, Value>,
}

impl ComponentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> RoboportResult<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Get a parameter value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Get parameter with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a parameter that must be present and well-typed
    pub fn require<T: for<'de> Deserialize<'de>>(&self, key: &str) -> RoboportResult<T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| RoboportError::config(format!("missing property '{}'", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RoboportError::config(format!("property '{}': {}", key, e)))
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> RoboportResult<()> {
        let json_value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for ComponentConfig {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let config = ComponentConfig::new()
            .with("rate_hz", 20)
            .unwrap()
            .with("frame", "laser")
            .unwrap();

        assert_eq!(config.get::<u32>("rate_hz"), Some(20));
        assert_eq!(config.get::<String>("frame").as_deref(), Some("laser"));
        assert_eq!(config.get_or("missing", 1.5), 1.5);
        // wrong type reads as absent
        assert_eq!(config.get::<bool>("rate_hz"), None);
    }

    #[test]
    fn test_require_reports_key() {
        let config = ComponentConfig::new();
        let err = config.require::<u32>("rate_hz").unwrap_err();
        assert!(err.to_string().contains("rate_hz"));
    }

    #[test]
    fn test_yaml_map_deserializes() {
        let config: ComponentConfig = serde_yaml::from_str("max_range: 30.0\nenabled: true\n").unwrap();
        assert_eq!(config.get::<f64>("max_range"), Some(30.0));
        assert_eq!(config.get::<bool>("enabled"), Some(true));
        assert_eq!(config.len(), 2);
    }
}
