// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jwks_gate::config::JWKS_PATH;

pub const SIGNING_KID: &str = "signing-key-1";
pub const SIGNING_PEM: &str = include_str!("../fixtures/signing_key.pem");
pub const SIGNING_JWK: &str = include_str!("../fixtures/signing_jwk.json");

pub const ROGUE_KID: &str = "rogue-key-1";
pub const ROGUE_PEM: &str = include_str!("../fixtures/rogue_key.pem");
pub const ROGUE_JWK: &str = include_str!("../fixtures/rogue_jwk.json");

pub const AUDIENCE: &str = "cars-api";
pub const DOMAIN: &str = "idp.example.com";
pub const ISSUER: &str = "https://idp.example.com/";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A JWKS document holding the given JWK fixtures.
pub fn jwks_body(jwks: &[&str]) -> Value {
    let keys: Vec<Value> = jwks
        .iter()
        .map(|jwk| serde_json::from_str(jwk).unwrap())
        .collect();
    json!({ "keys": keys })
}

pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}

/// Mount a JWKS response that must be requested exactly `times` times.
pub async fn mount_jwks(server: &MockServer, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_jwks_delayed(server: &MockServer, body: Value, delay: Duration, times: u64) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(delay),
        )
        .expect(times)
        .mount(server)
        .await;
}

pub async fn mount_jwks_status(server: &MockServer, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn received(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

pub fn valid_claims() -> Value {
    json!({
        "sub": "auth0|user-1",
        "aud": AUDIENCE,
        "iss": ISSUER,
        "iat": now(),
        "exp": now() + 3600,
    })
}

/// RS256 token signed with `pem` under `kid`.
pub fn sign(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn hs256_token(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(b"shared-secret")).unwrap()
}

/// `alg: none` token with an empty signature segment.
pub fn unsigned_token(kid: &str, claims: &Value) -> String {
    let header = json!({ "alg": "none", "kid": kid });
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{header}.{payload}.")
}

pub fn valid_token() -> String {
    sign(SIGNING_PEM, SIGNING_KID, &valid_claims())
}

/// `valid_claims()` with one field replaced.
pub fn claims_with(field: &str, value: Value) -> Value {
    let mut claims = valid_claims();
    claims[field] = value;
    claims
}
