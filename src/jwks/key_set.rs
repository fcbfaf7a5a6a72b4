//! Verification keys published by the identity provider.

use jsonwebtoken::jwk::{Jwk, JwkSet};

/// Keys by `kid`.
#[derive(Debug, Clone)]
pub struct KeySet {
    set: JwkSet,
}

impl KeySet {
    /// Parse a JWKS document (`{"keys": [...]}`).
    pub fn parse(document: &str) -> Result<Self, serde_json::Error> {
        let set: JwkSet = serde_json::from_str(document)?;
        Ok(Self { set })
    }

    pub fn get_key(&self, kid: &str) -> Option<&Jwk> {
        self.set.find(kid)
    }

    pub fn kids(&self) -> Vec<&str> {
        self.set
            .keys
            .iter()
            .filter_map(|k| k.common.key_id.as_deref())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.set.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.keys.is_empty()
    }
}
