// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed RSA keys and token builders for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use super::error::KeyError;
use super::jwks::{KeyResolver, SigningKey};
use super::verifier::Expectations;

pub const SIGNING_KID: &str = "signing-key-1";
pub const SIGNING_PEM: &str = include_str!("../../tests/fixtures/signing_key.pem");
pub const SIGNING_JWK: &str = include_str!("../../tests/fixtures/signing_jwk.json");

pub const ROGUE_KID: &str = "rogue-key-1";
pub const ROGUE_PEM: &str = include_str!("../../tests/fixtures/rogue_key.pem");

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn expectations() -> Expectations {
    Expectations {
        audience: "cars-api".to_string(),
        issuer: "https://idp.example.com/".to_string(),
        algorithm: Algorithm::RS256,
    }
}

pub fn valid_claims() -> serde_json::Value {
    serde_json::json!({
        "sub": "auth0|user-1",
        "aud": "cars-api",
        "iss": "https://idp.example.com/",
        "iat": now(),
        "exp": now() + 3600,
    })
}

/// RS256 token signed with `pem`; an empty `kid` leaves the header without one.
pub fn sign(pem: &str, kid: &str, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = (!kid.is_empty()).then(|| kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn hs256_token(kid: &str, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(b"shared-secret")).unwrap()
}

pub fn signing_key(algorithm: Option<Algorithm>) -> SigningKey {
    let jwk: Jwk = serde_json::from_str(SIGNING_JWK).unwrap();
    SigningKey {
        algorithm,
        ..SigningKey::from_jwk(&jwk).unwrap()
    }
}

/// In-memory [`KeyResolver`] that counts lookups.
pub struct StaticResolver {
    keys: HashMap<String, Arc<SigningKey>>,
    failure: Option<KeyError>,
    calls: AtomicUsize,
}

impl StaticResolver {
    pub fn with_signing_key() -> Self {
        Self::with_signing_key_for(Some(Algorithm::RS256))
    }

    pub fn with_signing_key_for(algorithm: Option<Algorithm>) -> Self {
        Self {
            keys: HashMap::from([(
                SIGNING_KID.to_string(),
                Arc::new(signing_key(algorithm)),
            )]),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: KeyError) -> Self {
        Self {
            keys: HashMap::new(),
            failure: Some(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyResolver for StaticResolver {
    async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| KeyError::KeyNotFound(kid.to_string()))
    }
}
