//! Decoded identity token.

use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::{Clock, SystemClock};

/// `aud` is either one audience or many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|a| a == audience),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
}

/// A serialized token together with its claims. Never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct IdToken {
    raw: String,
    claims: Claims,
}

impl IdToken {
    pub fn new(raw: impl Into<String>, claims: Claims) -> Self {
        Self {
            raw: raw.into(),
            claims,
        }
    }

    /// Read the claims without checking the signature.
    ///
    /// Only for tokens this process obtained itself; inbound tokens go
    /// through the key set validator.
    pub fn decode_unverified(raw: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(raw, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(Self::new(raw, data.claims))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn sub(&self) -> &str {
        &self.claims.sub
    }

    pub fn iss(&self) -> &str {
        &self.claims.iss
    }

    pub fn exp(&self) -> i64 {
        self.claims.exp
    }

    pub fn expired(&self) -> bool {
        self.expired_at(SystemClock.now())
    }

    pub fn expired_at(&self, now: i64) -> bool {
        now >= self.claims.exp
    }

    /// `("authorization", "Bearer <jwt>")`, ready for an outbound call.
    pub fn bearer_header(&self) -> (&'static str, String) {
        ("authorization", format!("Bearer {}", self.raw))
    }
}

// The raw token is a credential.
impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdToken")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}
