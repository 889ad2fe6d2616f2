//! Typed variable map used for process variables and payloads.
//!
//! Values are stored as JSON values so any serde-serializable type can be
//! set and read back with its concrete type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value as JsonValue, json};

/// An ordered-less map of variable name to JSON value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vars(HashMap<String, JsonValue>);

impl Vars {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Set a variable to any serializable value.
    pub fn set<T: Serialize>(
        &mut self,
        name: &str,
        value: T,
    ) {
        self.0.insert(name.to_string(), json!(value));
    }

    /// Read a variable back as a concrete type. Returns `None` when the
    /// variable is absent or not convertible.
    pub fn get<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Option<T> {
        self.0.get(name).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Raw JSON value access.
    pub fn get_value(
        &self,
        name: &str,
    ) -> Option<&JsonValue> {
        self.0.get(name)
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(
        &mut self,
        name: &str,
    ) -> Option<JsonValue> {
        self.0.remove(name)
    }

    pub fn extend(
        &mut self,
        other: &Vars,
    ) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<JsonValue> for Vars {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self(map.into_iter().collect()),
            _ => Self::new(),
        }
    }
}

impl From<Vars> for JsonValue {
    fn from(vars: Vars) -> Self {
        JsonValue::Object(vars.0.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use super::Vars;

    #[test]
    fn test_set_get_typed() {
        let mut vars = Vars::new();
        vars.set("approved", true);
        vars.set("amount", 42);
        vars.set("who", "alice");

        assert_eq!(vars.get::<bool>("approved"), Some(true));
        assert_eq!(vars.get::<i64>("amount"), Some(42));
        assert_eq!(vars.get::<String>("who"), Some("alice".to_string()));
        assert_eq!(vars.get::<String>("missing"), None);
    }

    #[test]
    fn test_json_round_trip() {
        let mut vars = Vars::new();
        vars.set("n", 1);
        let value: serde_json::Value = vars.clone().into();
        let back = Vars::from(value);
        assert_eq!(back, vars);
    }
}
