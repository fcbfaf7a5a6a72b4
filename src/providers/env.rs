//! Environment accessor.
//!
//! The token manager reads its client credentials and the last bearer token
//! through this contract, and writes freshly obtained tokens back through it so
//! later calls in the same process skip the persistence provider.

use dashmap::DashMap;

pub const CLIENT_ID: &str = "CLIENT_ID";
pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const IDENTITY_TOKEN_ENDPOINT: &str = "IDENTITY_TOKEN_ENDPOINT";
pub const BEARER_TOKEN: &str = "BEARER_TOKEN";

pub trait EnvironmentAccessor: Send + Sync {
    fn client_id(&self) -> Option<String>;
    fn client_secret(&self) -> Option<String>;
    fn identity_token_endpoint(&self) -> Option<String>;
    fn bearer_token(&self) -> Option<String>;
    fn set_env_var(&self, key: &str, value: &str);

    /// Names of the required variables that do not resolve.
    fn missing_vars(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id().is_none() {
            missing.push(CLIENT_ID);
        }
        if self.client_secret().is_none() {
            missing.push(CLIENT_SECRET);
        }
        if self.identity_token_endpoint().is_none() {
            missing.push(IDENTITY_TOKEN_ENDPOINT);
        }
        missing
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reads the process environment.
///
/// Writes land in an in-process overlay that shadows the real environment.
/// `std::env::set_var` is never called, as runtime worker threads may be
/// reading the environment at the same time.
#[derive(Debug, Default)]
pub struct ProcessEnv {
    written: DashMap<String, String>,
}

impl ProcessEnv {
    pub fn new() -> Self {
        Self::default()
    }

    fn var(&self, key: &str) -> Option<String> {
        non_empty(self.written.get(key).map(|r| r.value().clone()))
            .or_else(|| non_empty(std::env::var(key).ok()))
    }
}

impl EnvironmentAccessor for ProcessEnv {
    fn client_id(&self) -> Option<String> {
        self.var(CLIENT_ID)
    }

    fn client_secret(&self) -> Option<String> {
        self.var(CLIENT_SECRET)
    }

    fn identity_token_endpoint(&self) -> Option<String> {
        self.var(IDENTITY_TOKEN_ENDPOINT)
    }

    fn bearer_token(&self) -> Option<String> {
        self.var(BEARER_TOKEN)
    }

    fn set_env_var(&self, key: &str, value: &str) {
        self.written.insert(key.to_string(), value.to_string());
    }
}

/// An in-memory environment, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticEnv {
    vars: DashMap<String, String>,
}

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment with the three required variables set.
    pub fn with_credentials(client_id: &str, client_secret: &str, endpoint: &str) -> Self {
        let env = Self::new();
        env.set_env_var(CLIENT_ID, client_id);
        env.set_env_var(CLIENT_SECRET, client_secret);
        env.set_env_var(IDENTITY_TOKEN_ENDPOINT, endpoint);
        env
    }

    pub fn get(&self, key: &str) -> Option<String> {
        non_empty(self.vars.get(key).map(|r| r.value().clone()))
    }

    pub fn remove(&self, key: &str) {
        self.vars.remove(key);
    }
}

impl EnvironmentAccessor for StaticEnv {
    fn client_id(&self) -> Option<String> {
        self.get(CLIENT_ID)
    }

    fn client_secret(&self) -> Option<String> {
        self.get(CLIENT_SECRET)
    }

    fn identity_token_endpoint(&self) -> Option<String> {
        self.get(IDENTITY_TOKEN_ENDPOINT)
    }

    fn bearer_token(&self) -> Option<String> {
        self.get(BEARER_TOKEN)
    }

    fn set_env_var(&self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }
}
