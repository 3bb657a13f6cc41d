// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS resolver behaviour against a mock key endpoint.

mod common;

use std::num::{NonZeroU32, NonZeroUsize};
use std::time::Duration;

use common::*;
use jwks_gate::auth::{JwksOptions, JwksResolver, KeyError, KeyResolver};
use jwks_gate::config::JWKS_PATH;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(server: &MockServer, options: JwksOptions) -> JwksResolver {
    JwksResolver::new(jwks_url(server), options)
}

fn unlimited() -> JwksOptions {
    JwksOptions {
        requests_per_minute: None,
        ..JwksOptions::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_fetch() {
    let server = MockServer::start().await;
    mount_jwks_delayed(
        &server,
        jwks_body(&[SIGNING_JWK]),
        Duration::from_millis(300),
        1,
    )
    .await;

    let resolver = resolver(&server, JwksOptions::default());
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve(SIGNING_KID).await })
        })
        .collect();

    for handle in handles {
        let key = handle.await.unwrap().unwrap();
        assert_eq!(key.kid, SIGNING_KID);
    }
    assert_eq!(received(&server).await, 1);
}

#[tokio::test]
async fn cached_key_is_served_without_refetch() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK]), 1).await;

    let resolver = resolver(&server, JwksOptions::default());
    assert!(!resolver.is_cached(SIGNING_KID));

    resolver.resolve(SIGNING_KID).await.unwrap();
    assert!(resolver.is_cached(SIGNING_KID));
    resolver.resolve(SIGNING_KID).await.unwrap();
    resolver.resolve(SIGNING_KID).await.unwrap();

    assert_eq!(received(&server).await, 1);
}

#[tokio::test]
async fn expired_cache_entry_is_refetched() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK]), 2).await;

    let resolver = resolver(
        &server,
        JwksOptions {
            cache_ttl: Duration::from_millis(100),
            ..unlimited()
        },
    );

    resolver.resolve(SIGNING_KID).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!resolver.is_cached(SIGNING_KID));
    resolver.resolve(SIGNING_KID).await.unwrap();

    assert_eq!(received(&server).await, 2);
}

#[tokio::test]
async fn disabled_cache_fetches_every_time() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK]), 2).await;

    let resolver = resolver(
        &server,
        JwksOptions {
            cache_enabled: false,
            ..unlimited()
        },
    );

    resolver.resolve(SIGNING_KID).await.unwrap();
    resolver.resolve(SIGNING_KID).await.unwrap();
    assert!(!resolver.is_cached(SIGNING_KID));
}

#[tokio::test]
async fn cache_capacity_evicts_least_recently_used() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK, ROGUE_JWK]), 3).await;

    let resolver = resolver(
        &server,
        JwksOptions {
            cache_max_entries: NonZeroUsize::MIN,
            ..unlimited()
        },
    );

    resolver.resolve(SIGNING_KID).await.unwrap();
    resolver.resolve(ROGUE_KID).await.unwrap();
    assert!(!resolver.is_cached(SIGNING_KID));
    resolver.resolve(SIGNING_KID).await.unwrap();
}

#[tokio::test]
async fn rate_limit_refuses_without_contacting_endpoint() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK]), 2).await;

    let resolver = resolver(
        &server,
        JwksOptions {
            requests_per_minute: NonZeroU32::new(2),
            ..JwksOptions::default()
        },
    );

    assert_eq!(
        resolver.resolve("unknown-a").await.unwrap_err(),
        KeyError::KeyNotFound("unknown-a".to_string())
    );
    assert_eq!(
        resolver.resolve("unknown-b").await.unwrap_err(),
        KeyError::KeyNotFound("unknown-b".to_string())
    );
    assert_eq!(
        resolver.resolve(SIGNING_KID).await.unwrap_err(),
        KeyError::KeyFetchThrottled
    );

    assert_eq!(received(&server).await, 2);
}

#[tokio::test]
async fn unknown_kid_is_not_cached() {
    let server = MockServer::start().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK]), 2).await;

    let resolver = resolver(&server, unlimited());

    for _ in 0..2 {
        assert_eq!(
            resolver.resolve("nope").await.unwrap_err(),
            KeyError::KeyNotFound("nope".to_string())
        );
    }
}

#[tokio::test]
async fn server_error_is_reported_and_not_cached() {
    let server = MockServer::start().await;
    mount_jwks_status(&server, 500, 1).await;

    let resolver = resolver(&server, JwksOptions::default());

    match resolver.resolve(SIGNING_KID).await {
        Err(KeyError::KeyFetchFailed(reason)) => assert!(reason.contains("HTTP 500"), "{reason}"),
        other => panic!("expected fetch failure, got {other:?}"),
    }

    server.reset().await;
    mount_jwks(&server, jwks_body(&[SIGNING_JWK]), 1).await;

    let key = resolver.resolve(SIGNING_KID).await.unwrap();
    assert_eq!(key.kid, SIGNING_KID);
}

#[tokio::test]
async fn malformed_document_is_a_fetch_failure() {
    let server = MockServer::start().await;
    mount_jwks(&server, serde_json::json!({"not": "a jwks"}), 1).await;

    let resolver = resolver(&server, JwksOptions::default());

    assert!(matches!(
        resolver.resolve(SIGNING_KID).await,
        Err(KeyError::KeyFetchFailed(_))
    ));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_body(&[SIGNING_JWK]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let resolver = resolver(
        &server,
        JwksOptions {
            fetch_timeout: Duration::from_millis(200),
            ..JwksOptions::default()
        },
    );

    match resolver.resolve(SIGNING_KID).await {
        Err(KeyError::KeyFetchFailed(reason)) => assert_eq!(reason, "request timed out"),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_entries_do_not_hide_the_requested_key() {
    let server = MockServer::start().await;
    let x25519 = serde_json::json!({
        "kty": "OKP",
        "crv": "X25519",
        "use": "enc",
        "kid": "encryption-key-1",
        "x": "hSDwCYkwp1R0i33ctD73Wg2_Og0mOBr066SpjqqbTmo"
    });
    let unknown_kty = serde_json::json!({
        "kty": "AKP",
        "kid": "future-key-1",
        "alg": "ML-DSA-44",
        "pub": "AAAA"
    });
    let mut body = jwks_body(&[SIGNING_JWK]);
    let keys = body["keys"].as_array_mut().unwrap();
    keys.insert(0, unknown_kty);
    keys.insert(0, x25519);
    mount_jwks(&server, body, 2).await;

    let resolver = resolver(&server, unlimited());

    let key = resolver.resolve(SIGNING_KID).await.unwrap();
    assert_eq!(key.kid, SIGNING_KID);

    match resolver.resolve("future-key-1").await {
        Err(KeyError::KeyFetchFailed(reason)) => assert!(reason.contains("future-key-1"), "{reason}"),
        other => panic!("expected unsupported key failure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_waiter_does_not_cancel_shared_fetch() {
    let server = MockServer::start().await;
    mount_jwks_delayed(
        &server,
        jwks_body(&[SIGNING_JWK]),
        Duration::from_millis(400),
        1,
    )
    .await;

    let resolver = resolver(&server, JwksOptions::default());

    let first = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.resolve(SIGNING_KID).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.resolve(SIGNING_KID).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    let key = second.await.unwrap().unwrap();
    assert_eq!(key.kid, SIGNING_KID);
    assert!(resolver.is_cached(SIGNING_KID));
    assert_eq!(received(&server).await, 1);
}
