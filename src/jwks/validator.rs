//! Key set validator.
//!
//! # Responsibilities
//! - Verify inbound bearer tokens against the identity provider's key set
//! - Keep the key set cached in-process and mirrored to the persistence
//!   provider so cold starts skip the fetch
//!
//! # Data Flow
//! ```text
//! parse_and_verify(token)
//!     → header kid
//!     → key set (cache → persisted JWKS → GET jwks endpoint)
//!     → header alg pinned to the key (declared alg, else key family)
//!     → signature
//!     → iss, exp, optional aud
//!     → IdToken
//! ```
//!
//! # Design Decisions
//! - A fetched document is parsed before it is persisted; a document that
//!   is not a key set is neither persisted nor cached
//! - Persistence failures are logged and do not fail validation
//! - Expiry is checked against the injected clock, not by `jsonwebtoken`

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::sync::Arc;

use crate::cache::LazyCache;
use crate::clock::{self, Clock};
use crate::config::schema::AuthConfig;
use crate::http::client::{HttpTransport, ResilientClient};
use crate::jwks::error::JwksError;
use crate::jwks::key_set::KeySet;
use crate::observability::metrics;
use crate::providers::circuit::CircuitStateProvider;
use crate::providers::store::{self, InMemoryStore, PersistenceProvider};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::token::id_token::{Claims, IdToken};

pub struct KeySetValidator {
    client: ResilientClient,
    store: Arc<dyn PersistenceProvider>,
    circuit: Option<Arc<dyn CircuitStateProvider>>,
    clock: Arc<dyn Clock>,
    jwks_url: Option<String>,
    issuer: String,
    audience: Option<String>,
    keys: LazyCache<KeySet>,
}

impl KeySetValidator {
    pub fn builder(config: &AuthConfig) -> KeySetValidatorBuilder {
        KeySetValidatorBuilder::new(config)
    }

    /// Verify `token` and return its claims.
    pub async fn parse_and_verify(&self, token: &str) -> Result<IdToken, JwksError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| JwksError::decoding(format!("header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| JwksError::decoding("kid: token header has no key id"))?;

        let keys = self.key_set().await?;
        let jwk = keys
            .get_key(&kid)
            .ok_or_else(|| JwksError::decoding(format!("no key for kid {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| JwksError::decoding(format!("kid {}: unusable key: {}", kid, e)))?;

        let alg = signing_algorithm(&kid, jwk, header.alg)?;
        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience.as_str()]),
            None => validation.validate_aud = false,
        }

        let data = jsonwebtoken::decode::<Claims>(token, &key, &validation)?;
        let verified = IdToken::new(token, data.claims);

        if verified.expired_at(self.clock.now()) {
            return Err(JwksError::decoding(format!(
                "exp: token expired at {}",
                verified.exp()
            )));
        }

        tracing::debug!(sub = verified.sub(), kid = %kid, "Token verified");
        Ok(verified)
    }

    /// Drop the cached key set; the next validation repopulates.
    pub fn invalidate(&self) {
        self.keys.invalidate();
    }

    /// The cached key set, if populated.
    pub fn cached_key_set(&self) -> Option<Arc<KeySet>> {
        self.keys.peek()
    }

    async fn key_set(&self) -> Result<Arc<KeySet>, JwksError> {
        self.keys.get_or_populate(|| self.populate()).await
    }

    async fn populate(&self) -> Result<KeySet, JwksError> {
        match self.store.read(store::JWKS).await {
            Ok(Some(document)) => match KeySet::parse(&document) {
                Ok(keys) => {
                    tracing::debug!(keys = keys.len(), "Key set loaded from persistence");
                    return Ok(keys);
                }
                Err(e) => tracing::warn!(error = %e, "Persisted key set does not parse, refetching"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Persisted key set unreadable, refetching"),
        }

        let url = self
            .jwks_url
            .as_deref()
            .ok_or_else(|| JwksError::get("No JWKS endpoint configured", 500, serde_json::Value::Null))?;

        let options = self.client.options().step("get_jwks");
        let response = match self.client.get(url, options, self.circuit.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_jwks_fetch("failure");
                return Err(e.into());
            }
        };

        let document = response.text();
        let keys = match KeySet::parse(&document) {
            Ok(keys) => keys,
            Err(e) => {
                metrics::record_jwks_fetch("failure");
                return Err(JwksError::get(
                    format!("Failed to get JWKS: response is not a key set: {}", e),
                    response.status,
                    response.body,
                ));
            }
        };
        metrics::record_jwks_fetch("success");
        tracing::info!(url, keys = keys.len(), "Fetched key set");

        if let Err(e) = self.store.write(store::JWKS, &document).await {
            tracing::warn!(error = %e, "Failed to persist key set");
        }
        Ok(keys)
    }
}

/// Check the token's header algorithm against what `jwk` permits.
///
/// A key that declares `alg` accepts only that algorithm. A key without one
/// accepts the signing algorithms of its key type.
fn signing_algorithm(kid: &str, jwk: &Jwk, requested: Algorithm) -> Result<Algorithm, JwksError> {
    let allowed = match &jwk.common.key_algorithm {
        Some(declared) => match declared_signing_algorithm(declared) {
            Some(alg) => vec![alg],
            None => {
                return Err(JwksError::decoding(format!(
                    "alg: kid {} declares non-signing algorithm {:?}",
                    kid, declared
                )))
            }
        },
        None => match &jwk.algorithm {
            AlgorithmParameters::OctetKey(_) => {
                vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512]
            }
            AlgorithmParameters::RSA(_) => vec![
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            AlgorithmParameters::EllipticCurve(_) => vec![Algorithm::ES256, Algorithm::ES384],
            AlgorithmParameters::OctetKeyPair(_) => vec![Algorithm::EdDSA],
        },
    };

    if allowed.contains(&requested) {
        Ok(requested)
    } else {
        Err(JwksError::decoding(format!(
            "alg: token signed with {:?}, kid {} accepts {:?}",
            requested, kid, allowed
        )))
    }
}

fn declared_signing_algorithm(declared: &KeyAlgorithm) -> Option<Algorithm> {
    match declared {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

pub struct KeySetValidatorBuilder {
    config: AuthConfig,
    store: Option<Arc<dyn PersistenceProvider>>,
    circuit: Option<Arc<dyn CircuitStateProvider>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl KeySetValidatorBuilder {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            config: config.clone(),
            store: None,
            circuit: None,
            clock: None,
            transport: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn PersistenceProvider>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn circuit(mut self, circuit: Arc<dyn CircuitStateProvider>) -> Self {
        self.circuit = Some(circuit);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn jwks_url(mut self, url: impl Into<String>) -> Self {
        self.config.identity.jwks_endpoint = Some(url.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.identity.issuer = issuer.into();
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.identity.audience = Some(audience.into());
        self
    }

    pub fn build(self) -> KeySetValidator {
        let clock = self.clock.unwrap_or_else(clock::system);
        let client = match self.transport {
            Some(transport) => ResilientClient::with_transport(&self.config, transport),
            None => ResilientClient::new(&self.config),
        }
        .with_breaker(CircuitBreaker::with_clock(
            self.config.circuit.clone(),
            Arc::clone(&clock),
        ));

        KeySetValidator {
            client,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            circuit: self.circuit,
            clock,
            jwks_url: self.config.identity.jwks_url(),
            issuer: self.config.identity.issuer,
            audience: self.config.identity.audience,
            keys: LazyCache::new(),
        }
    }
}
