// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. three-segment structure and a decodable header
//! 2. header `alg` equals the pinned algorithm
//! 3. `kid` resolves to a signing key
//! 4. signature
//! 5. `exp` / `nbf`
//! 6. `aud` contains the expected audience
//! 7. `iss` equals the expected issuer
//!
//! Nothing is retried here.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use tracing::instrument;

use super::claims::Claims;
use super::error::AuthError;
use super::jwks::KeyResolver;

/// What a token must match to be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectations {
    pub audience: String,
    pub issuer: String,
    pub algorithm: Algorithm,
}

/// Validates bearer tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str, expected: &Expectations) -> Result<Claims, AuthError>;
}

/// [`TokenVerifier`] backed by a [`KeyResolver`].
pub struct JwtVerifier {
    resolver: Arc<dyn KeyResolver>,
    /// Clock skew tolerance for `exp` / `nbf`, in seconds.
    leeway: i64,
}

impl JwtVerifier {
    pub fn new(resolver: Arc<dyn KeyResolver>) -> Self {
        Self {
            resolver,
            leeway: 0,
        }
    }

    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway = i64::try_from(seconds).unwrap_or(i64::MAX);
        self
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    #[instrument(skip_all, name = "gate.verifier.verify")]
    async fn verify(&self, token: &str, expected: &Expectations) -> Result<Claims, AuthError> {
        if !has_three_segments(token) {
            return Err(AuthError::TokenMalformed);
        }

        // Checked on the raw header so that algorithms jsonwebtoken cannot
        // parse, such as `none`, still count as a mismatch.
        let declared = declared_algorithm(token)?;
        if Algorithm::from_str(&declared).ok() != Some(expected.algorithm) {
            return Err(AuthError::AlgorithmMismatch {
                expected: expected.algorithm,
                found: declared,
            });
        }

        let header = decode_header(token).map_err(|_| AuthError::TokenMalformed)?;

        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::TokenMalformed)?;

        let key = self.resolver.resolve(&kid).await?;

        if let Some(key_alg) = key.algorithm {
            if key_alg != expected.algorithm {
                return Err(AuthError::AlgorithmMismatch {
                    expected: expected.algorithm,
                    found: format!("{key_alg:?}"),
                });
            }
        }

        // Signature only; claim checks below keep their own order.
        let mut validation = Validation::new(expected.algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let token_data =
            decode::<Claims>(token, &key.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidKeyFormat => AuthError::SignatureInvalid,
                _ => AuthError::TokenMalformed,
            })?;

        let claims = token_data.claims;
        check_claims(&claims, expected, chrono::Utc::now().timestamp(), self.leeway)?;

        tracing::debug!(
            target: "gate.verifier",
            kid = %kid,
            sub = claims.subject().unwrap_or_default(),
            "Token verified"
        );
        Ok(claims)
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// The `alg` the token header declares, without interpreting it.
fn declared_algorithm(token: &str) -> Result<String, AuthError> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::TokenMalformed)?;
    let header: RawHeader =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::TokenMalformed)?;
    Ok(header.alg)
}

/// Header and payload must be non-empty; an empty signature is left for the
/// algorithm and signature checks to reject.
fn has_three_segments(token: &str) -> bool {
    let mut segments = token.split('.');
    let well_formed = (0..2).all(|_| segments.next().is_some_and(|s| !s.is_empty()));
    well_formed && segments.next().is_some() && segments.next().is_none()
}

/// Time window, audience and issuer checks against `now` (Unix seconds).
pub(crate) fn check_claims(
    claims: &Claims,
    expected: &Expectations,
    now: i64,
    leeway: i64,
) -> Result<(), AuthError> {
    let exp = claims.exp.ok_or(AuthError::TokenMalformed)?;
    if now >= exp.saturating_add(leeway) {
        return Err(AuthError::TokenExpired);
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(leeway) {
            return Err(AuthError::TokenNotYetValid);
        }
    }

    let audience_ok = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(&expected.audience));
    if !audience_ok {
        return Err(AuthError::AudienceMismatch);
    }

    if claims.iss.as_deref() != Some(expected.issuer.as_str()) {
        return Err(AuthError::IssuerMismatch);
    }

    Ok(())
}
