// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS Gate - JWT bearer authentication for HTTP services
//!
//! Verifies RS256 (or another pinned asymmetric algorithm) access tokens
//! issued by an OpenID-style identity provider, resolving signing keys from
//! the provider's published JWKS.
//!
//! ## Modules
//!
//! - `api` - Demo HTTP routes (Axum)
//! - `auth` - Key resolution, token verification and the request gate
//! - `config` - Environment configuration
//! - `error` - HTTP error rendering
//! - `telemetry` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;
