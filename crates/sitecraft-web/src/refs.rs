use serde_json::{Map, Value};

/// Logical name -> element id table behind the client's `$refs.get(name)`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    entries: Map<String, Value>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last registration for a name wins.
    pub fn register(&mut self, name: &str, element_id: &str) {
        self.entries
            .insert(name.to_string(), Value::String(element_id.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object text, e.g. `{"panel":"sc-id-3-abcd"}`.
    pub fn serialize(&self) -> String {
        Value::Object(self.entries.clone()).to_string()
    }

    pub fn flush(&mut self) -> String {
        let table = self.serialize();
        self.entries.clear();
        table
    }
}
