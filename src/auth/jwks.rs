// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - Keys are cached per `kid` with a TTL and an LRU capacity bound
//! - Expired entries are dropped on lookup and re-fetched, never served stale
//! - Concurrent misses for the same `kid` share one outbound fetch
//! - Outbound fetches are capped by a [`FetchRateLimiter`]
//! - Failed fetches are not cached, so the next miss tries again
//!
//! The shared fetch runs on its own task: a request that gives up waiting does
//! not cancel it for the others.

use std::collections::HashMap;
use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use lru::LruCache;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use super::error::KeyError;
use super::rate_limit::FetchRateLimiter;

/// Default JWKS cache TTL (10 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default number of cached keys.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 5;

/// Default outbound fetch ceiling per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 5;

/// Default timeout for one JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Public key material for one `kid`. Immutable once fetched.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    /// Algorithm the key is published for; `None` when the JWK omits `alg`.
    pub algorithm: Option<Algorithm>,
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Convert a JWK into a verification key.
    ///
    /// Keys published for encryption, or with an algorithm that is not a
    /// public-key signature algorithm, are rejected.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, KeyError> {
        let kid = jwk
            .common
            .key_id
            .clone()
            .ok_or_else(|| KeyError::KeyFetchFailed("JWK without 'kid'".to_string()))?;

        if !is_signing_use(jwk) {
            return Err(KeyError::KeyNotFound(kid));
        }

        let algorithm = match jwk.common.key_algorithm {
            None => None,
            Some(key_alg) => Some(signing_algorithm(key_alg).ok_or_else(|| {
                KeyError::KeyFetchFailed(format!("key '{kid}' is not published for signing"))
            })?),
        };

        let decoding_key = match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e),
            AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y),
            AlgorithmParameters::OctetKeyPair(okp) => DecodingKey::from_ed_components(&okp.x),
            _ => {
                return Err(KeyError::KeyFetchFailed(format!(
                    "unsupported key type for '{kid}'"
                )))
            }
        }
        .map_err(|e| KeyError::KeyFetchFailed(format!("invalid key material for '{kid}': {e}")))?;

        Ok(Self {
            kid,
            algorithm,
            decoding_key,
        })
    }
}

fn is_signing_use(jwk: &Jwk) -> bool {
    matches!(
        jwk.common.public_key_use,
        None | Some(PublicKeyUse::Signature)
    )
}

fn signing_algorithm(key_alg: KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Translates a key identifier into signing key material.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeyError>;
}

/// Tunables for [`JwksResolver`].
#[derive(Debug, Clone)]
pub struct JwksOptions {
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_max_entries: NonZeroUsize,
    /// Fetches per minute; `None` disables rate limiting.
    pub requests_per_minute: Option<NonZeroU32>,
    pub fetch_timeout: Duration,
}

impl Default for JwksOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_max_entries: NonZeroUsize::new(DEFAULT_CACHE_MAX_ENTRIES)
                .unwrap_or(NonZeroUsize::MIN),
            requests_per_minute: NonZeroU32::new(DEFAULT_REQUESTS_PER_MINUTE),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

type FetchResult = Result<Arc<SigningKey>, KeyError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct CachedKey {
    key: Arc<SigningKey>,
    expires_at: Instant,
}

struct ResolverState {
    cache: LruCache<String, CachedKey>,
    in_flight: HashMap<String, SharedFetch>,
}

impl ResolverState {
    fn cached(&mut self, kid: &str) -> Option<Arc<SigningKey>> {
        let expired = match self.cache.get(kid) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(Arc::clone(&entry.key));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.cache.pop(kid);
        }
        None
    }
}

struct Inner {
    jwks_url: String,
    client: reqwest::Client,
    options: JwksOptions,
    limiter: Option<FetchRateLimiter>,
    state: Mutex<ResolverState>,
}

/// JWKS-backed [`KeyResolver`] with caching, single-flight fetches and a
/// fetch rate limit.
///
/// Cheap to clone; clones share cache and limiter.
#[derive(Clone)]
pub struct JwksResolver {
    inner: Arc<Inner>,
}

impl JwksResolver {
    /// Create a resolver for a JWKS endpoint, e.g.
    /// `https://idp.example.com/.well-known/jwks.json`.
    pub fn new(jwks_url: impl Into<String>, options: JwksOptions) -> Self {
        let client = reqwest::Client::builder()
            .timeout(options.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        let limiter = options.requests_per_minute.map(FetchRateLimiter::per_minute);

        Self {
            inner: Arc::new(Inner {
                jwks_url: jwks_url.into(),
                client,
                limiter,
                state: Mutex::new(ResolverState {
                    cache: LruCache::new(options.cache_max_entries),
                    in_flight: HashMap::new(),
                }),
                options,
            }),
        }
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.inner.jwks_url
    }

    /// Whether a non-expired entry for `kid` is cached.
    pub fn is_cached(&self, kid: &str) -> bool {
        self.inner.lock_state().cached(kid).is_some()
    }

    fn spawn_fetch(&self, kid: &str) -> SharedFetch {
        let task_inner = Arc::clone(&self.inner);
        let task_kid = kid.to_string();
        let handle = tokio::spawn(async move {
            let result = task_inner.fetch_key(&task_kid).await;
            task_inner.complete(&task_kid, &result);
            result
        });

        let inner = Arc::clone(&self.inner);
        let kid = kid.to_string();
        handle
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    inner.lock_state().in_flight.remove(&kid);
                    Err(KeyError::KeyFetchFailed(format!("JWKS fetch task failed: {e}")))
                })
            })
            .boxed()
            .shared()
    }
}

#[async_trait]
impl KeyResolver for JwksResolver {
    #[instrument(skip_all, fields(kid = %kid))]
    async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, KeyError> {
        let pending = {
            let mut state = self.inner.lock_state();

            if let Some(key) = state.cached(kid) {
                tracing::debug!(target: "gate.jwks", kid = %kid, "JWKS cache hit");
                return Ok(key);
            }

            match state.in_flight.get(kid) {
                Some(pending) => {
                    tracing::debug!(target: "gate.jwks", kid = %kid, "Joining in-flight JWKS fetch");
                    pending.clone()
                }
                None => {
                    if let Some(limiter) = &self.inner.limiter {
                        if !limiter.try_acquire() {
                            tracing::warn!(
                                target: "gate.jwks",
                                kid = %kid,
                                limit = limiter.limit(),
                                "JWKS fetch refused by rate limit"
                            );
                            return Err(KeyError::KeyFetchThrottled);
                        }
                    }
                    let pending = self.spawn_fetch(kid);
                    state.in_flight.insert(kid.to_string(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a finished fetch: clear the in-flight slot, cache successes.
    fn complete(&self, kid: &str, result: &FetchResult) {
        let mut state = self.lock_state();
        state.in_flight.remove(kid);

        if let Ok(key) = result {
            if self.options.cache_enabled {
                state.cache.put(
                    kid.to_string(),
                    CachedKey {
                        key: Arc::clone(key),
                        expires_at: Instant::now() + self.options.cache_ttl,
                    },
                );
            }
        }
    }

    async fn fetch_key(&self, kid: &str) -> FetchResult {
        let jwks = self.fetch_jwks().await?;
        let key_count = jwks.keys.len();

        let entry = jwks
            .keys
            .into_iter()
            .find(|k| k.get("kid").and_then(Value::as_str) == Some(kid))
            .ok_or_else(|| {
                tracing::warn!(target: "gate.jwks", kid = %kid, "Key not found in JWKS");
                KeyError::KeyNotFound(kid.to_string())
            })?;

        // Only the requested entry is parsed; other entries may use key
        // types this crate cannot represent.
        let jwk: Jwk = serde_json::from_value(entry).map_err(|e| {
            tracing::warn!(target: "gate.jwks", kid = %kid, error = %e, "Unsupported JWK");
            KeyError::KeyFetchFailed(format!("unsupported JWK '{kid}': {e}"))
        })?;

        let key = SigningKey::from_jwk(&jwk)?;
        tracing::info!(
            target: "gate.jwks",
            kid = %kid,
            algorithm = ?key.algorithm,
            key_count,
            "Signing key fetched"
        );
        Ok(Arc::new(key))
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<RawJwks, KeyError> {
        tracing::debug!(target: "gate.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.jwks_url)
            .timeout(self.options.fetch_timeout)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                };
                tracing::warn!(target: "gate.jwks", error = %reason, "Failed to fetch JWKS");
                KeyError::KeyFetchFailed(reason)
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: "gate.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(KeyError::KeyFetchFailed(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response.json::<RawJwks>().await.map_err(|e| {
            tracing::warn!(target: "gate.jwks", error = %e, "Failed to parse JWKS response");
            KeyError::KeyFetchFailed(format!("invalid JWKS document: {e}"))
        })
    }
}

/// JWKS document with entries left unparsed.
#[derive(Debug, Deserialize)]
struct RawJwks {
    keys: Vec<Value>,
}
