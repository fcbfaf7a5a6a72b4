//! Resilient calls to the identity provider.
//!
//! # Responsibilities
//! - Send GET/POST requests with per-call auth, headers, encoding and deadline
//! - Turn failure statuses into `HttpError`s carrying the response body
//! - Retry retryable failures with backoff
//! - Guard the whole exchange with a circuit breaker when a circuit is given
//!
//! # Design Decisions
//! - The transport is a trait so tests can script responses without a socket
//! - Any status >= 400 is a failure; only >= 500, transport errors and
//!   timeouts are retried, for GET and POST alike
//! - The breaker judges the outcome after retries, one verdict per call

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::AuthConfig;
use crate::http::error::HttpError;
use crate::http::request::{Auth, Encoding, HttpRequest, Method, RequestOptions};
use crate::http::response::HttpResponse;
use crate::providers::circuit::CircuitStateProvider;
use crate::resilience::backoff::Backoff;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::{retries, timeouts};

/// Performs a single exchange. Statuses are returned, not judged.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let step = request.options.step.as_str();

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        builder = match &request.options.auth {
            Some(Auth::Basic { username, password }) => builder.basic_auth(username, Some(password)),
            Some(Auth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };

        for (name, value) in &request.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = match request.options.encoding {
                Encoding::Json => builder.json(body),
                Encoding::UrlEncoded => builder.form(&request.form_pairs()),
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::transport(step, e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response
            .text()
            .await
            .map_err(|e| HttpError::transport(step, e.to_string()))?;

        Ok(HttpResponse::from_parts(status, content_type.as_deref(), text))
    }
}

pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    breaker: CircuitBreaker,
    backoff: Backoff,
    max_retries: u32,
    timeout: Duration,
}

impl ResilientClient {
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::default()))
    }

    pub fn with_transport(config: &AuthConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            breaker: CircuitBreaker::new(config.circuit.clone()),
            backoff: Backoff::from(&config.http),
            max_retries: config.circuit.max_retries,
            timeout: Duration::from_millis(config.http.timeout_ms),
        }
    }

    /// Replace the breaker, e.g. to share a clock with the caller.
    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Options seeded with this client's default deadline.
    pub fn options(&self) -> RequestOptions {
        RequestOptions::default().timeout(self.timeout)
    }

    pub async fn post(
        &self,
        endpoint: &str,
        body: Value,
        options: RequestOptions,
        circuit: Option<&dyn CircuitStateProvider>,
    ) -> Result<HttpResponse, HttpError> {
        self.execute(HttpRequest::post(endpoint, body, options), circuit)
            .await
    }

    pub async fn get(
        &self,
        endpoint: &str,
        options: RequestOptions,
        circuit: Option<&dyn CircuitStateProvider>,
    ) -> Result<HttpResponse, HttpError> {
        self.execute(HttpRequest::get(endpoint, options), circuit).await
    }

    async fn execute(
        &self,
        request: HttpRequest,
        circuit: Option<&dyn CircuitStateProvider>,
    ) -> Result<HttpResponse, HttpError> {
        let step = request.options.step.clone();
        let result = self
            .breaker
            .guard(circuit, || {
                retries::retry(self.max_retries, self.backoff, &step, || {
                    self.attempt(&request)
                })
            })
            .await;

        if let Err(e) = &result {
            tracing::warn!(
                step = %step,
                method = %request.method,
                url = %request.url,
                code = e.code,
                error = %e.message,
                "Request failed"
            );
        }
        result
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let step = request.options.step.as_str();
        let limit = request.options.timeout;

        let response = timeouts::enforce(limit, self.transport.send(request))
            .await
            .map_err(|_| HttpError::timeout(step, limit))??;

        if response.status >= 400 {
            return Err(HttpError::from_response(step, response));
        }

        tracing::debug!(step, status = response.status, "Request succeeded");
        Ok(response)
    }
}
