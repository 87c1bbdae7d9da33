//! Config overrides.
//!
//! Overrides are keyed by property path (`Variable` or `Variable->Member`)
//! and applied on top of class defaults when a module is configured.

use indexmap::IndexMap;
use modrig_core::value::PATH_SEPARATOR;
use modrig_core::{CoreError, Value, VariableSet};
use serde::{Deserialize, Serialize};

/// Ordered set of property path overrides for one module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigOverrides {
    values: IndexMap<String, Value>,
}

/// Check if `path` is nested below `parent`
fn is_child_path(path: &str, parent: &str) -> bool {
    path.len() > parent.len() + PATH_SEPARATOR.len()
        && path.starts_with(parent)
        && path[parent.len()..].starts_with(PATH_SEPARATOR)
}

/// Root variable of a path
#[must_use]
pub fn root_variable(path: &str) -> &str {
    path.split(PATH_SEPARATOR).next().unwrap_or(path)
}

impl ConfigOverrides {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an override (builder form)
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set(path, value);
        self
    }

    /// Set an override, dropping overrides nested below it
    pub fn set(&mut self, path: impl Into<String>, value: Value) {
        let path = path.into();
        self.values.retain(|existing, _| !is_child_path(existing, &path));
        self.values.insert(path, value);
    }

    /// Remove an override
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        self.values.shift_remove(path)
    }

    /// Get an override
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// The overridden path that contains `path`, if any
    #[must_use]
    pub fn overridden_parent(&self, path: &str) -> Option<&str> {
        self.values
            .keys()
            .find(|existing| is_child_path(path, existing))
            .map(String::as_str)
    }

    /// Keep only overrides for which `keep(path, value)` holds
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.values.retain(|path, value| keep(path, value));
    }

    /// Apply every override to `variables`.
    ///
    /// Overrides that fail to apply are skipped and returned with the reason.
    pub fn apply_to(&self, variables: &mut VariableSet) -> Vec<(String, CoreError)> {
        let mut failures = Vec::new();
        for (path, value) in &self.values {
            if let Err(err) = variables.set_path(path, value.clone()) {
                failures.push((path.clone(), err));
            }
        }
        failures
    }

    /// Iterate overrides in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of overrides
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use modrig_core::VariableDescriptor;

    #[test]
    fn test_set_drops_children() {
        let mut overrides = ConfigOverrides::new()
            .with("Color->R", Value::Float(0.0))
            .with("Color->G", Value::Float(0.0))
            .with("Speed", Value::Float(2.0));
        let mut color = IndexMap::new();
        color.insert("R".to_string(), Value::Float(1.0));
        color.insert("G".to_string(), Value::Float(1.0));
        overrides.set("Color", Value::Struct(color));

        assert_eq!(overrides.len(), 2);
        assert!(overrides.get("Color->R").is_none());
        assert!(overrides.get("Speed").is_some());
    }

    #[test]
    fn test_child_path_prefix_is_not_a_name_prefix() {
        let overrides = ConfigOverrides::new().with("Speed", Value::Float(1.0));
        assert_eq!(overrides.overridden_parent("Speed->X"), Some("Speed"));
        assert_eq!(overrides.overridden_parent("SpeedScale"), None);
        assert_eq!(overrides.overridden_parent("Speed"), None);
    }

    #[test]
    fn test_apply_reports_failures() {
        let mut vars = VariableSet::new().with(VariableDescriptor::new("Speed", Value::Float(1.0)));
        let overrides = ConfigOverrides::new()
            .with("Speed", Value::Float(4.0))
            .with("Missing", Value::Bool(true))
            .with("Speed->X", Value::Float(0.0));
        let failures = overrides.apply_to(&mut vars);
        assert_eq!(vars.value("Speed"), Some(&Value::Float(4.0)));
        let failed: Vec<_> = failures.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(failed, vec!["Missing", "Speed->X"]);
    }

    #[test]
    fn test_root_variable() {
        assert_eq!(root_variable("Color->R"), "Color");
        assert_eq!(root_variable("Speed"), "Speed");
    }

    #[test]
    fn test_json_is_a_plain_map() {
        let overrides = ConfigOverrides::new().with("Speed", Value::Float(2.0));
        let json = serde_json::to_string(&overrides).unwrap();
        assert_eq!(json, r#"{"Speed":{"type":"Float","value":2.0}}"#);
    }
}
