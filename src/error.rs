// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;

/// Error rendered to HTTP clients.
///
/// Authentication failures of every kind collapse into the same shape: status
/// 401, `error: "unauthorized"`, plus a diagnostic message and code.
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
    pub error_code: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self {
            error_code: Some(err.error_code()),
            ..Self::unauthorized(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: "unauthorized",
            message: self.message,
            error_code: self.error_code,
        });
        (
            status,
            [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
            body,
        )
            .into_response()
    }
}
