//! Self token manager.
//!
//! # Responsibilities
//! - Hand out a valid bearer token for this service's own outbound calls
//! - Reuse tokens from the environment or the persistence provider when they
//!   are still good, and run a client-credentials grant otherwise
//! - Refresh early, at a jittered moment inside the refresh window, so that
//!   many instances sharing one token do not all refresh at once
//!
//! # Data Flow
//! ```text
//! token()
//!     → credentials resolve?            no → TokenError::Env
//!     → cache (populate on first use):
//!         env BEARER_TOKEN, overridden by persisted BEARER_TOKEN
//!         → reusable?  yes → FromEnv / FromCache
//!                      no  → POST client_credentials grant → FromGrant
//!         → write back by source
//!     → expired or inside the refresh window? → invalidate, populate once more
//! ```
//!
//! # Design Decisions
//! - The second population result is returned as-is; there is no third try
//! - Self tokens are decoded without signature checks; they came from the
//!   identity provider over TLS with this service's own credentials
//! - An unreadable persistence store counts as empty; only write failures
//!   surface as `TokenError::Persistence`

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::LazyCache;
use crate::clock::{self, Clock};
use crate::config::schema::{AuthConfig, TokenConfig};
use crate::http::client::{HttpTransport, ResilientClient};
use crate::http::request::{Auth, Encoding};
use crate::observability::metrics;
use crate::providers::circuit::CircuitStateProvider;
use crate::providers::env::{self, EnvironmentAccessor, ProcessEnv};
use crate::providers::store::{self, InMemoryStore, PersistenceProvider};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::retry_window;
use crate::token::error::TokenError;
use crate::token::id_token::IdToken;

/// Where a cached token came from. Decides what gets written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    FromEnv,
    FromCache,
    FromGrant,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: IdToken,
    source: TokenSource,
}

/// Resolved client credentials.
struct Credentials {
    client_id: String,
    client_secret: String,
    endpoint: String,
}

pub struct TokenManager {
    client: ResilientClient,
    env: Arc<dyn EnvironmentAccessor>,
    store: Arc<dyn PersistenceProvider>,
    circuit: Option<Arc<dyn CircuitStateProvider>>,
    clock: Arc<dyn Clock>,
    config: TokenConfig,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_endpoint: Option<String>,
    audience: Option<String>,
    timeout: Option<Duration>,
    cache: LazyCache<CachedToken>,
}

impl TokenManager {
    pub fn builder(config: &AuthConfig) -> TokenManagerBuilder {
        TokenManagerBuilder::new(config)
    }

    /// A bearer token that is unexpired and not yet due for refresh, as far
    /// as one refresh attempt allows.
    pub async fn token(&self) -> Result<IdToken, TokenError> {
        let credentials = self.credentials()?;

        let cached = self.current(&credentials).await?;
        if !self.due_for_refresh(&cached.token) {
            return Ok(cached.token.clone());
        }

        tracing::debug!(
            exp = cached.token.exp(),
            source = ?cached.source,
            "Self token due for refresh"
        );
        self.cache.invalidate();
        let refreshed = self.current(&credentials).await?;
        Ok(refreshed.token.clone())
    }

    /// Drop the cached token; the next `token()` repopulates.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }

    /// Source of the currently cached token, if any.
    pub fn cached_source(&self) -> Option<TokenSource> {
        self.cache.peek().map(|cached| cached.source)
    }

    fn credentials(&self) -> Result<Credentials, TokenError> {
        let client_id = self.client_id.clone().or_else(|| self.env.client_id());
        let client_secret = self
            .client_secret
            .clone()
            .or_else(|| self.env.client_secret());
        let endpoint = self
            .token_endpoint
            .clone()
            .or_else(|| self.env.identity_token_endpoint());

        match (client_id, client_secret, endpoint) {
            (Some(client_id), Some(client_secret), Some(endpoint)) => Ok(Credentials {
                client_id,
                client_secret,
                endpoint,
            }),
            _ => {
                let missing = self
                    .env
                    .missing_vars()
                    .into_iter()
                    .filter(|var| !self.configured(var))
                    .collect();
                Err(TokenError::Env { missing })
            }
        }
    }

    /// Whether the config supplies `var` in place of the environment.
    fn configured(&self, var: &str) -> bool {
        match var {
            env::CLIENT_ID => self.client_id.is_some(),
            env::CLIENT_SECRET => self.client_secret.is_some(),
            env::IDENTITY_TOKEN_ENDPOINT => self.token_endpoint.is_some(),
            _ => false,
        }
    }

    async fn current(&self, credentials: &Credentials) -> Result<Arc<CachedToken>, TokenError> {
        self.cache
            .get_or_populate(|| self.populate(credentials))
            .await
    }

    fn due_for_refresh(&self, token: &IdToken) -> bool {
        let now = self.clock.now();
        token.expired_at(now)
            || retry_window::in_window(
                self.config.window_width_secs,
                token.exp() - self.config.expiry_threshold_secs,
                now,
            )
    }

    fn reusable(&self, token: &IdToken) -> bool {
        let now = self.clock.now();
        !token.expired_at(now)
            && retry_window::left_of_window(
                self.config.window_width_secs,
                token.exp() - self.config.expiry_threshold_secs,
                now,
            )
    }

    async fn populate(&self, credentials: &Credentials) -> Result<CachedToken, TokenError> {
        metrics::record_cache_miss();

        let from_env = self.env.bearer_token();
        let persisted = match self.store.read(store::BEARER_TOKEN).await {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!(error = %e, "Persisted self token unreadable, using environment");
                None
            }
        };

        let existing = persisted.or_else(|| from_env.clone()).and_then(|raw| {
            let source = if from_env.as_deref() == Some(raw.as_str()) {
                TokenSource::FromEnv
            } else {
                TokenSource::FromCache
            };
            match IdToken::decode_unverified(&raw) {
                Ok(token) if self.reusable(&token) => Some(CachedToken { token, source }),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(error = %e, "Stored self token does not decode, ignoring");
                    None
                }
            }
        });

        let cached = match existing {
            Some(cached) => cached,
            None => CachedToken {
                token: self.grant(credentials).await?,
                source: TokenSource::FromGrant,
            },
        };

        self.write_back(&cached).await?;
        tracing::debug!(source = ?cached.source, exp = cached.token.exp(), "Self token cached");
        Ok(cached)
    }

    async fn grant(&self, credentials: &Credentials) -> Result<IdToken, TokenError> {
        let mut body = json!({
            "grant_type": "client_credentials",
            "scopes": "openid",
        });
        if let Some(audience) = &self.audience {
            body["audience"] = json!(audience);
        }

        let mut options = self
            .client
            .options()
            .step("client_credentials_grant")
            .auth(Auth::basic(&credentials.client_id, &credentials.client_secret))
            .encoding(Encoding::UrlEncoded);
        if let Some(timeout) = self.timeout {
            options = options.timeout(timeout);
        }

        let response = match self
            .client
            .post(&credentials.endpoint, body, options, self.circuit.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                metrics::record_grant("failure");
                return Err(e.into());
            }
        };

        let Some(access_token) = response.str_field("access_token") else {
            metrics::record_grant("failure");
            return Err(TokenError::grant_status(response.status, response.body.clone()));
        };

        let token = IdToken::decode_unverified(access_token)?;
        metrics::record_grant("success");
        tracing::info!(sub = token.sub(), exp = token.exp(), "Obtained self token");
        Ok(token)
    }

    async fn write_back(&self, cached: &CachedToken) -> Result<(), TokenError> {
        let raw = cached.token.as_str();
        match cached.source {
            TokenSource::FromEnv => {}
            TokenSource::FromCache => self.env.set_env_var(env::BEARER_TOKEN, raw),
            TokenSource::FromGrant => {
                self.store.write(store::BEARER_TOKEN, raw).await?;
                self.env.set_env_var(env::BEARER_TOKEN, raw);
            }
        }
        Ok(())
    }
}

pub struct TokenManagerBuilder {
    config: AuthConfig,
    env: Option<Arc<dyn EnvironmentAccessor>>,
    store: Option<Arc<dyn PersistenceProvider>>,
    circuit: Option<Arc<dyn CircuitStateProvider>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn HttpTransport>>,
    timeout: Option<Duration>,
}

impl TokenManagerBuilder {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            config: config.clone(),
            env: None,
            store: None,
            circuit: None,
            clock: None,
            transport: None,
            timeout: None,
        }
    }

    pub fn env(mut self, env: Arc<dyn EnvironmentAccessor>) -> Self {
        self.env = Some(env);
        self
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

    pub fn window_width(mut self, secs: i64) -> Self {
        self.config.token.window_width_secs = secs;
        self
    }

    pub fn expiry_threshold(mut self, secs: i64) -> Self {
        self.config.token.expiry_threshold_secs = secs;
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.identity.audience = Some(audience.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> TokenManager {
        let clock = self.clock.unwrap_or_else(clock::system);
        let client = match self.transport {
            Some(transport) => ResilientClient::with_transport(&self.config, transport),
            None => ResilientClient::new(&self.config),
        }
        .with_breaker(CircuitBreaker::with_clock(
            self.config.circuit.clone(),
            Arc::clone(&clock),
        ));

        let identity = self.config.identity;
        TokenManager {
            client,
            env: self.env.unwrap_or_else(|| Arc::new(ProcessEnv::new())),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            circuit: self.circuit,
            clock,
            config: self.config.token,
            client_id: identity.client_id,
            client_secret: identity.client_secret,
            token_endpoint: identity.token_endpoint,
            audience: identity.audience,
            timeout: self.timeout,
            cache: LazyCache::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http::error::HttpError;
    use crate::http::request::HttpRequest;
    use crate::http::response::HttpResponse;
    use crate::providers::env::StaticEnv;
    use crate::providers::store::StoreError;
    use async_trait::async_trait;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn mint(sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({"iss": "https://idp.test", "sub": sub, "exp": exp}),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap()
    }

    /// Answers every grant with the next canned token.
    struct Grants {
        tokens: Mutex<Vec<String>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl Grants {
        fn new(tokens: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(tokens),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for Grants {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut tokens = self.tokens.lock().unwrap();
            if tokens.is_empty() {
                return Ok(HttpResponse::new(401, json!({"error": "invalid_client"})));
            }
            let token = tokens.remove(0);
            Ok(HttpResponse::new(200, json!({"access_token": token, "token_type": "Bearer"})))
        }
    }

    /// A store whose backend is unavailable for reads, and optionally writes.
    struct UnavailableStore {
        writes_fail: bool,
    }

    #[async_trait]
    impl PersistenceProvider for UnavailableStore {
        async fn write(&self, _key: &str, value: &str) -> Result<String, StoreError> {
            if self.writes_fail {
                return Err(StoreError::Backend("parameter store throttled".into()));
            }
            Ok(value.to_string())
        }

        async fn read(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("parameter store throttled".into()))
        }
    }

    fn with_store(store: UnavailableStore, grants: Arc<Grants>) -> (TokenManager, Arc<StaticEnv>) {
        let env = Arc::new(StaticEnv::with_credentials("id", "secret", "https://idp.test/token"));
        let manager = TokenManager::builder(&AuthConfig::default())
            .env(env.clone())
            .store(Arc::new(store))
            .transport(grants)
            .clock(Arc::new(ManualClock::new(NOW)))
            .build();
        (manager, env)
    }

    struct Fixture {
        manager: TokenManager,
        env: Arc<StaticEnv>,
        store: InMemoryStore,
        grants: Arc<Grants>,
        clock: Arc<ManualClock>,
    }

    fn fixture(tokens: Vec<String>) -> Fixture {
        let env = Arc::new(StaticEnv::with_credentials("id", "secret", "https://idp.test/token"));
        let store = InMemoryStore::new();
        let grants = Grants::new(tokens);
        let clock = Arc::new(ManualClock::new(NOW));

        let manager = TokenManager::builder(&AuthConfig::default())
            .env(env.clone())
            .store(Arc::new(store.clone()))
            .transport(grants.clone())
            .clock(clock.clone())
            .build();

        Fixture {
            manager,
            env,
            store,
            grants,
            clock,
        }
    }

    #[tokio::test]
    async fn test_first_call_grants_and_writes_back() {
        let raw = mint("svc", NOW + DAY);
        let f = fixture(vec![raw.clone()]);

        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "svc");
        assert_eq!(f.grants.count(), 1);
        assert_eq!(f.manager.cached_source(), Some(TokenSource::FromGrant));
        assert_eq!(f.store.read(store::BEARER_TOKEN).await.unwrap(), Some(raw.clone()));
        assert_eq!(f.env.get(env::BEARER_TOKEN), Some(raw));
    }

    #[tokio::test]
    async fn test_grant_request_shape() {
        let f = fixture(vec![mint("svc", NOW + DAY)]);
        f.manager.token().await.unwrap();

        let requests = f.grants.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.url, "https://idp.test/token");
        assert_eq!(request.options.encoding, Encoding::UrlEncoded);
        assert_eq!(request.options.auth, Some(Auth::basic("id", "secret")));
        assert_eq!(
            request.body,
            Some(json!({"grant_type": "client_credentials", "scopes": "openid"}))
        );
    }

    #[tokio::test]
    async fn test_second_call_reuses_cache() {
        let f = fixture(vec![mint("first", NOW + DAY), mint("second", NOW + DAY)]);

        let first = f.manager.token().await.unwrap();
        let second = f.manager.token().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.grants.count(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_refetched_once() {
        let f = fixture(vec![mint("first", NOW + DAY), mint("second", NOW + 3 * DAY)]);
        f.manager.token().await.unwrap();

        f.clock.advance(DAY + 1);
        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "second");
        assert_eq!(f.grants.count(), 2);
    }

    #[tokio::test]
    async fn test_env_token_reused_without_writes() {
        let raw = mint("from-env", NOW + DAY);
        let f = fixture(vec![]);
        f.env.set_env_var(env::BEARER_TOKEN, &raw);

        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "from-env");
        assert_eq!(f.grants.count(), 0);
        assert_eq!(f.manager.cached_source(), Some(TokenSource::FromEnv));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_persisted_token_overrides_env() {
        let persisted = mint("persisted", NOW + DAY);
        let f = fixture(vec![]);
        f.env.set_env_var(env::BEARER_TOKEN, &mint("stale-env", NOW + DAY));
        f.store.write(store::BEARER_TOKEN, &persisted).await.unwrap();

        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "persisted");
        assert_eq!(f.manager.cached_source(), Some(TokenSource::FromCache));
        assert_eq!(f.env.get(env::BEARER_TOKEN), Some(persisted));
    }

    #[tokio::test]
    async fn test_expired_persisted_token_triggers_grant() {
        let f = fixture(vec![mint("fresh", NOW + DAY)]);
        f.store
            .write(store::BEARER_TOKEN, &mint("old", NOW - 10))
            .await
            .unwrap();

        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "fresh");
        assert_eq!(f.grants.count(), 1);
    }

    #[tokio::test]
    async fn test_grant_failure_surfaces_status_and_body() {
        let f = fixture(vec![]);

        let err = f.manager.token().await.unwrap_err();

        match err {
            TokenError::Grant { message, ctx, code } => {
                assert_eq!(code, 401);
                assert_eq!(message, "Client Credentials Grant Failure with status 401");
                assert_eq!(ctx, json!({"error": "invalid_client"}));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.manager.cached_source().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let env = Arc::new(StaticEnv::new());
        env.set_env_var(env::CLIENT_ID, "id");
        let manager = TokenManager::builder(&AuthConfig::default())
            .env(env)
            .transport(Grants::new(vec![]))
            .build();

        match manager.token().await.unwrap_err() {
            TokenError::Env { missing } => {
                assert_eq!(missing, vec![env::CLIENT_SECRET, env::IDENTITY_TOKEN_ENDPOINT]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_config_credentials_take_precedence() {
        let mut config = AuthConfig::default();
        config.identity.client_id = Some("cfg-id".into());
        config.identity.client_secret = Some("cfg-secret".into());
        config.identity.token_endpoint = Some("https://cfg.test/token".into());
        let grants = Grants::new(vec![mint("svc", NOW + DAY)]);

        let manager = TokenManager::builder(&config)
            .env(Arc::new(StaticEnv::new()))
            .transport(grants.clone())
            .clock(Arc::new(ManualClock::new(NOW)))
            .audience("orders")
            .build();
        manager.token().await.unwrap();

        let requests = grants.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://cfg.test/token");
        assert_eq!(requests[0].body.as_ref().unwrap()["audience"], "orders");
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_population() {
        let f = fixture(vec![mint("first", NOW + DAY)]);
        f.manager.token().await.unwrap();

        f.manager.invalidate();
        assert!(f.manager.cached_source().is_none());

        // The written-back token is picked up from the store without a grant.
        let token = f.manager.token().await.unwrap();
        assert_eq!(token.sub(), "first");
        assert_eq!(f.grants.count(), 1);
        assert_eq!(f.manager.cached_source(), Some(TokenSource::FromEnv));
    }

    #[tokio::test]
    async fn test_store_read_failure_falls_back_to_env_token() {
        let grants = Grants::new(vec![]);
        let (manager, env) = with_store(UnavailableStore { writes_fail: false }, grants.clone());
        env.set_env_var(env::BEARER_TOKEN, &mint("from-env", NOW + DAY));

        let token = manager.token().await.unwrap();

        assert_eq!(token.sub(), "from-env");
        assert_eq!(grants.count(), 0);
        assert_eq!(manager.cached_source(), Some(TokenSource::FromEnv));
    }

    #[tokio::test]
    async fn test_store_read_failure_without_env_token_grants() {
        let grants = Grants::new(vec![mint("fresh", NOW + DAY)]);
        let (manager, _env) = with_store(UnavailableStore { writes_fail: false }, grants.clone());

        let token = manager.token().await.unwrap();

        assert_eq!(token.sub(), "fresh");
        assert_eq!(grants.count(), 1);
    }

    #[tokio::test]
    async fn test_store_write_failure_after_grant_propagates() {
        let grants = Grants::new(vec![mint("fresh", NOW + DAY)]);
        let (manager, _env) = with_store(UnavailableStore { writes_fail: true }, grants.clone());

        let err = manager.token().await.unwrap_err();

        assert!(matches!(err, TokenError::Persistence(StoreError::Backend(_))));
        assert_eq!(grants.count(), 1);
        assert!(manager.cached_source().is_none());
    }

    #[tokio::test]
    async fn test_env_token_inside_refresh_window_is_replaced() {
        // exp - expiry threshold lands 5s ahead, inside the certain-retry threshold.
        let f = fixture(vec![mint("fresh", NOW + DAY)]);
        f.env.set_env_var(env::BEARER_TOKEN, &mint("due", NOW + 3600 + 5));

        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "fresh");
        assert_eq!(f.grants.count(), 1);
        assert_eq!(f.manager.cached_source(), Some(TokenSource::FromGrant));
        assert_eq!(f.env.get(env::BEARER_TOKEN), Some(token.as_str().to_string()));
    }

    #[tokio::test]
    async fn test_persisted_token_inside_refresh_window_is_replaced() {
        let f = fixture(vec![mint("fresh", NOW + DAY)]);
        f.store
            .write(store::BEARER_TOKEN, &mint("due", NOW + 3600 + 5))
            .await
            .unwrap();

        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "fresh");
        assert_eq!(f.grants.count(), 1);
        assert_eq!(
            f.store.read(store::BEARER_TOKEN).await.unwrap(),
            Some(token.as_str().to_string())
        );
    }

    #[tokio::test]
    async fn test_cached_token_refreshed_early_once_in_window() {
        let f = fixture(vec![mint("first", NOW + DAY), mint("second", NOW + 2 * DAY)]);
        f.manager.token().await.unwrap();

        // Unexpired, but 5s short of the window end.
        f.clock.set(NOW + DAY - 3600 - 5);
        let token = f.manager.token().await.unwrap();

        assert_eq!(token.sub(), "second");
        assert_eq!(f.grants.count(), 2);
        assert_eq!(f.manager.cached_source(), Some(TokenSource::FromGrant));
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_configured_values() {
        let mut config = AuthConfig::default();
        config.identity.client_secret = Some("cfg-secret".into());
        let manager = TokenManager::builder(&config)
            .env(Arc::new(StaticEnv::new()))
            .transport(Grants::new(vec![]))
            .build();

        match manager.token().await.unwrap_err() {
            TokenError::Env { missing } => {
                assert_eq!(missing, vec![env::CLIENT_ID, env::IDENTITY_TOKEN_ENDPOINT]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
