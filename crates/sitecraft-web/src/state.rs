use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Seed values for the client-side reactive store.
///
/// Writes mirror the client store: storing a value equal to the current one
/// is reported as "unchanged" and leaves the table untouched.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    values: Map<String, Value>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the stored value changed.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if self.values.get(key) == Some(&value) {
            return false;
        }
        self.values.insert(key.to_string(), value);
        true
    }

    pub fn set_serialized<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<bool> {
        let value = serde_json::to_value(value).map_err(|source| Error::State {
            key: key.to_string(),
            source,
        })?;
        Ok(self.set(key, value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn serialize(&self) -> String {
        Value::Object(self.values.clone()).to_string()
    }

    pub fn flush(&mut self) -> String {
        let snapshot = self.serialize();
        self.values.clear();
        snapshot
    }
}
