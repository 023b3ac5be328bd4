//! Schema-less events as pushed by the Intear feed.
//!
//! Every stream has its own shape, so an event is kept as the raw JSON
//! object. Accessors return `None` for absent fields instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event record from an upstream batch.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Raw value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Field value when it is a JSON string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Field rendered as text: strings verbatim, everything else as compact JSON.
    pub fn text(&self, field: &str) -> Option<String> {
        self.0.get(field).map(value_text)
    }

    /// Like [`Event::text`], but treats empty strings and `null` as absent.
    pub fn non_empty_text(&self, field: &str) -> Option<String> {
        match self.0.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(value_text(v)),
        }
    }

    pub fn account_id(&self) -> Option<String> {
        self.non_empty_text("account_id")
    }

    pub fn transaction_id(&self) -> Option<String> {
        self.non_empty_text("transaction_id")
    }

    pub fn receipt_id(&self) -> Option<String> {
        self.non_empty_text("receipt_id")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Render a JSON value for interpolation into alert text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
