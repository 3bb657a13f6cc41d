// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every variant here describes a credential problem, including the ones that
//! originate in the identity provider's key endpoint. None of them is a server
//! fault: they all render as `401 Unauthorized` through [`crate::error::ApiError`].

use axum::response::{IntoResponse, Response};
use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::error::ApiError;

/// Key resolution failure.
///
/// `Clone` because a single in-flight fetch hands the same result to every
/// request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key set was fetched but has no usable signing key with this id
    #[error("No signing key with id '{0}' in JWKS")]
    KeyNotFound(String),
    /// Endpoint unreachable, timed out, non-2xx, or returned garbage
    #[error("Failed to fetch JWKS: {0}")]
    KeyFetchFailed(String),
    /// Outbound fetch ceiling reached for the current window
    #[error("JWKS fetch rate limit reached")]
    KeyFetchThrottled,
}

impl KeyError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            KeyError::KeyNotFound(_) => "key_not_found",
            KeyError::KeyFetchFailed(_) => "key_fetch_failed",
            KeyError::KeyFetchThrottled => "key_fetch_throttled",
        }
    }
}

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token present
    #[error("No authorization token was found")]
    TokenMissing,
    /// Authorization header present but not `<scheme> <credentials>`
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// Token is structurally invalid
    #[error("Token is malformed")]
    TokenMalformed,
    /// Declared or key algorithm differs from the pinned one
    #[error("Token algorithm '{found}' is not the expected {expected:?}")]
    AlgorithmMismatch {
        expected: Algorithm,
        /// As declared, so names jsonwebtoken does not know (`none`) survive.
        found: String,
    },
    /// Signing key could not be resolved
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(#[from] KeyError),
    /// Token signature is invalid
    #[error("Token signature is invalid")]
    SignatureInvalid,
    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,
    /// Token is not yet valid
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    /// Token audience does not include the expected audience
    #[error("Token audience is invalid")]
    AudienceMismatch,
    /// Token issuer is not the expected issuer
    #[error("Token issuer is invalid")]
    IssuerMismatch,
}

impl AuthError {
    /// Get the error code for this error.
    ///
    /// Key resolution failures report the underlying resolver kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::TokenMissing => "token_missing",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::AlgorithmMismatch { .. } => "algorithm_mismatch",
            AuthError::KeyUnavailable(inner) => inner.error_code(),
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::IssuerMismatch => "issuer_mismatch",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
