// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for verified claims.
//!
//! Use the `Auth` extractor in handlers behind the gate:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims.sub is the authenticated subject
//! }
//! ```
//!
//! The extractor does not verify anything itself; it only reads what
//! [`require_auth`](super::gate::require_auth) stored. A handler reached without
//! the gate gets a `TokenMissing` rejection.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, Claims};

/// Verified claims of the current request.
pub struct Auth(pub Claims);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::TokenMissing)
    }
}
