//! Shared fixtures for integration tests: signing keys, token minting,
//! and a transport that talks to the local mock server.

#![allow(dead_code)]

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;

use self_token::config::AuthConfig;
use self_token::http::ReqwestTransport;

pub const NOW: i64 = 1_700_000_000;
pub const HOUR: i64 = 3_600;
pub const DAY: i64 = 86_400;

pub const ISSUER: &str = "https://idp.example.test";
pub const KID: &str = "test-key-1";

/// Base64 of the HMAC key. Alphanumeric only, so the standard and
/// URL-safe alphabets read it the same way.
pub const SECRET: &str = "c2VsZnRva2VuVGVzdFNpZ25pbmdLZXkwMTIzNDU2Nzg5";

/// A JWKS document holding the test key.
pub fn jwks() -> Value {
    json!({
        "keys": [
            {"kty": "oct", "kid": KID, "alg": "HS256", "use": "sig", "k": SECRET}
        ]
    })
}

pub fn mint(claims: Value) -> String {
    mint_with_kid(Some(KID), claims)
}

pub fn mint_with_kid(kid: Option<&str>, claims: Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_base64_secret(SECRET).unwrap();
    encode(&header, &claims, &key).unwrap()
}

/// A token issued by the test issuer for `sub`, expiring at `exp`.
pub fn token_for(sub: &str, exp: i64) -> String {
    mint(json!({
        "iss": ISSUER,
        "sub": sub,
        "aud": "self-token-tests",
        "iat": exp - DAY,
        "exp": exp,
        "azp": "test-client"
    }))
}

pub fn token_response(token: &str) -> String {
    json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": DAY
    })
    .to_string()
}

/// Transport that bypasses any proxy configured in the environment.
pub fn transport() -> Arc<ReqwestTransport> {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    Arc::new(ReqwestTransport::new(client))
}

/// Defaults with short backoff so retry tests stay fast.
pub fn fast_config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.http.base_delay_ms = 1;
    config.http.max_delay_ms = 5;
    config.http.timeout_ms = 2_000;
    config.identity.issuer = ISSUER.to_string();
    config
}
