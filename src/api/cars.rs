// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;

use crate::auth::{Audience, Auth};

/// Identity of the caller as established by the gate.
#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub subject: Option<String>,
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Echo the verified claims back to the caller.
pub async fn identity(Auth(claims): Auth) -> Json<IdentityResponse> {
    Json(IdentityResponse {
        subject: claims.sub,
        issuer: claims.iss,
        audience: claims.aud,
        expires_at: claims.exp,
    })
}
