//! JSON resource wrapper for response payloads.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Wraps a serializable value for a JSON response.
///
/// An "empty" resource (null, `false`, `0`, `""`, `"0"`, `[]`, `{}`) renders as an
/// empty array.
#[derive(Debug, Clone)]
pub struct Resource<T> {
    resource: T,
}

impl<T: Serialize> Resource<T> {
    pub fn new(resource: T) -> Self {
        Self { resource }
    }

    pub fn into_inner(self) -> T {
        self.resource
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        let value = serde_json::to_value(&self.resource)?;
        if is_empty(&value) {
            return Ok(Value::Array(Vec::new()));
        }
        Ok(value)
    }

    /// The rendered resource wrapped under a `data` key.
    pub fn into_body(self) -> serde_json::Result<Value> {
        Ok(json!({ "data": self.to_value()? }))
    }

    /// Renders each item as its own resource.
    pub fn collection<I>(items: I) -> serde_json::Result<Value>
    where
        I: IntoIterator<Item = T>,
    {
        let data = items
            .into_iter()
            .map(|item| Resource::new(item).to_value())
            .collect::<serde_json::Result<Vec<_>>>()?;
        let mut body = Map::new();
        body.insert("data".to_string(), Value::Array(data));
        Ok(Value::Object(body))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
