// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! JWT bearer authentication against an identity provider's published JWKS.
//!
//! ## Auth Flow
//!
//! 1. Client obtains a token from the identity provider
//! 2. Client sends `Authorization: Bearer <JWT>`
//! 3. For routes covered by the gate:
//!    - The header's `alg` must equal the pinned algorithm
//!    - The signing key is resolved by `kid` (cache, else JWKS fetch)
//!    - Signature, `exp`/`nbf`, `aud` and `iss` are checked
//!    - Verified claims go into the request extensions
//! 4. Any failure becomes a 401, never a 5xx
//!
//! ## Components
//!
//! - [`KeyResolver`] / [`JwksResolver`]: cached, rate-limited, single-flight key lookup
//! - [`TokenVerifier`] / [`JwtVerifier`]: ordered token checks
//! - [`AuthGate`] / [`require_auth`]: request-level entry point

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod jwks;
pub mod rate_limit;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{Audience, Claims};
pub use error::{AuthError, KeyError};
pub use extractor::Auth;
pub use gate::{bearer_token, require_auth, AuthGate, MethodSet, RouteRule, Verdict};
pub use jwks::{JwksOptions, JwksResolver, KeyResolver, SigningKey};
pub use rate_limit::FetchRateLimiter;
pub use verifier::{Expectations, JwtVerifier, TokenVerifier};
