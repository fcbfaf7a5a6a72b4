//! Outbound request description.
//!
//! # Responsibilities
//! - Describe one call to the identity provider independent of the transport
//! - Carry the per-call options (auth, headers, encoding, timeout, step name)
//!
//! # Design Decisions
//! - Bodies are JSON values; `Encoding` decides how they go on the wire
//! - The step name travels with the request so every error can name its origin

use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::config::schema::HttpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// Wire encoding of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`; the body must be a flat object.
    UrlEncoded,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Credentials stay out of debug output.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => write!(f, "Basic({}, ***)", username),
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub auth: Option<Auth>,
    pub headers: Vec<(String, String)>,
    pub encoding: Encoding,
    pub timeout: Duration,
    /// Name of the calling step, reported in errors and logs.
    pub step: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for RequestOptions {
    fn from(config: &HttpConfig) -> Self {
        Self {
            auth: None,
            headers: Vec::new(),
            encoding: Encoding::Json,
            timeout: Duration::from_millis(config.timeout_ms),
            step: "http".to_string(),
        }
    }
}

impl RequestOptions {
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A fully described outbound call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub options: RequestOptions,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            options,
        }
    }

    pub fn post(url: impl Into<String>, body: Value, options: RequestOptions) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
            options,
        }
    }

    /// Body as form pairs. Non-string scalars are rendered as JSON text.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        match &self.body {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_pairs_flatten_object() {
        let request = HttpRequest::post(
            "https://idp/token",
            json!({"grant_type": "client_credentials", "max_age": 60}),
            RequestOptions::default().encoding(Encoding::UrlEncoded),
        );
        let mut pairs = request.form_pairs();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("grant_type".to_string(), "client_credentials".to_string()),
                ("max_age".to_string(), "60".to_string()),
            ]
        );
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let rendered = format!("{:?}", Auth::basic("client", "s3cret"));
        assert_eq!(rendered, "Basic(client, ***)");
        assert!(!format!("{:?}", Auth::Bearer("jwt".into())).contains("jwt"));
    }

    #[test]
    fn test_options_builder() {
        let options = RequestOptions::default()
            .step("token_service")
            .header("x-trace", "1")
            .timeout(Duration::from_secs(1));
        assert_eq!(options.step, "token_service");
        assert_eq!(options.headers, vec![("x-trace".to_string(), "1".to_string())]);
        assert_eq!(options.timeout, Duration::from_secs(1));
        assert_eq!(options.encoding, Encoding::Json);
    }
}
