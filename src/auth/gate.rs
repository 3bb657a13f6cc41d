// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate for Axum.
//!
//! The gate sits in front of a route set. For requests it covers, it extracts
//! the bearer token, verifies it, and either stores the [`Claims`] in the
//! request extensions or answers with a 401. Every failure kind, including key
//! endpoint outages, ends up as the same "unauthorized" response.
//!
//! ```rust,ignore
//! let gate = Arc::new(
//!     AuthGate::new(verifier, expectations)
//!         .with_routes(vec![RouteRule::new("/cars*", MethodSet::All)]),
//! );
//!
//! let app = Router::new()
//!     .route("/cars", get(list_cars))
//!     .layer(axum::middleware::from_fn_with_state(gate, require_auth));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use super::claims::Claims;
use super::error::AuthError;
use super::verifier::{Expectations, TokenVerifier};
use crate::error::ApiError;

/// Outcome of authenticating one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Authenticated(Claims),
    Rejected(AuthError),
}

impl Verdict {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Verdict::Authenticated(_))
    }
}

/// HTTP methods a rule covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    All,
    Only(Vec<Method>),
}

impl MethodSet {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodSet::All => true,
            MethodSet::Only(methods) => methods.contains(method),
        }
    }
}

/// A protected path pattern plus the methods it covers.
///
/// A trailing `*` makes the pattern a prefix match on whole path segments:
/// `/cars*` covers `/cars` and `/cars/42` but not `/carsharing`. Without `*`
/// the path must match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub pattern: String,
    pub methods: MethodSet,
}

impl RouteRule {
    pub fn new(pattern: impl Into<String>, methods: MethodSet) -> Self {
        Self {
            pattern: pattern.into(),
            methods,
        }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        let path_matches = match self.pattern.strip_suffix('*') {
            Some(prefix) => path.strip_prefix(prefix).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/')
            }),
            None => path == self.pattern,
        };
        path_matches && self.methods.allows(method)
    }
}

/// Request-level authentication entry point.
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    expectations: Expectations,
    routes: Vec<RouteRule>,
    enabled: bool,
}

impl AuthGate {
    /// Create an enabled gate covering every request it is layered on.
    pub fn new(verifier: Arc<dyn TokenVerifier>, expectations: Expectations) -> Self {
        Self {
            verifier,
            expectations,
            routes: Vec::new(),
            enabled: true,
        }
    }

    /// Restrict the gate to these rules. An empty list covers everything.
    pub fn with_routes(mut self, routes: Vec<RouteRule>) -> Self {
        self.routes = routes;
        self
    }

    /// Switch the gate on or off without touching the route table.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn expectations(&self) -> &Expectations {
        &self.expectations
    }

    /// Whether a request with this method and path must be authenticated.
    pub fn applies_to(&self, method: &Method, path: &str) -> bool {
        self.enabled
            && (self.routes.is_empty() || self.routes.iter().any(|r| r.matches(method, path)))
    }

    /// Authenticate a request from its headers.
    pub async fn handle(&self, headers: &HeaderMap) -> Verdict {
        let token = match bearer_token(headers) {
            Ok(token) => token,
            Err(err) => return Verdict::Rejected(err),
        };

        match self.verifier.verify(token, &self.expectations).await {
            Ok(claims) => Verdict::Authenticated(claims),
            Err(err) => Verdict::Rejected(err),
        }
    }
}

/// Extract the bearer token from the `Authorization` header.
///
/// The scheme is matched case-insensitively. A missing or empty header, or a
/// scheme other than Bearer, counts as no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?,
        None => return Err(AuthError::TokenMissing),
    };

    if value.trim().is_empty() {
        return Err(AuthError::TokenMissing);
    }

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if !token.is_empty() => {
            if scheme.eq_ignore_ascii_case("bearer") {
                Ok(token)
            } else {
                Err(AuthError::TokenMissing)
            }
        }
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Authentication middleware function.
///
/// Requests outside the gate's route table pass straight through.
#[instrument(
    skip_all,
    name = "gate.middleware.auth",
    fields(method = %request.method(), path = %request.uri().path())
)]
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !gate.applies_to(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match gate.handle(request.headers()).await {
        Verdict::Authenticated(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Verdict::Rejected(err) => {
            match &err {
                AuthError::KeyUnavailable(_) => tracing::warn!(
                    target: "gate.middleware",
                    error_code = err.error_code(),
                    error = %err,
                    "Request rejected"
                ),
                _ => tracing::debug!(
                    target: "gate.middleware",
                    error_code = err.error_code(),
                    error = %err,
                    "Request rejected"
                ),
            }
            ApiError::from(err).into_response()
        }
    }
}
