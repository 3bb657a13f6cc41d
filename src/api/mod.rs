// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::auth::{require_auth, AuthGate};

pub mod cars;
pub mod health;

/// Build the HTTP router with the authentication gate in front of every route.
///
/// The gate itself decides which paths it covers, so public routes such as
/// `/ping` live in the same router.
pub fn router(gate: Arc<AuthGate>) -> Router {
    Router::new()
        .route("/ping", get(health::ping))
        .route("/cars/identity", get(cars::identity))
        .layer(middleware::from_fn_with_state(gate, require_auth))
        .layer(TraceLayer::new_for_http())
}
