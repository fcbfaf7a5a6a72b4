//! Response handling.
//!
//! # Responsibilities
//! - Hold the status and decoded body of a provider response
//! - Decode JSON bodies by content type, keep anything else as text
//!
//! # Design Decisions
//! - A JSON content type with an unparseable body falls back to text rather
//!   than failing; the status decides success, not the body

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Build from raw parts as received from the wire.
    pub fn from_parts(status: u16, content_type: Option<&str>, text: String) -> Self {
        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// A top-level string field of a JSON body.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }

    /// The body as text; JSON bodies are re-serialized.
    pub fn text(&self) -> String {
        match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
