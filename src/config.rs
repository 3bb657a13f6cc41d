// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH0_DOMAIN` | Identity provider host | Required |
//! | `AUTH0_AUDIENCE` | Expected JWT audience | Falls back to `AUTH0_CLIENT_ID` |
//! | `AUTH0_CLIENT_ID` | Client identifier used as audience | Optional |
//! | `AUTH0_ISSUER` | Expected JWT issuer | `https://<domain>/` |
//! | `AUTH_ALGORITHM` | Pinned signing algorithm | `RS256` |
//! | `AUTH_JWKS_URL` | Key discovery endpoint | `https://<domain>/.well-known/jwks.json` |
//! | `AUTH_JWKS_CACHE` | Cache signing keys | `true` |
//! | `AUTH_JWKS_CACHE_TTL_SECS` | Key cache TTL | `600` |
//! | `AUTH_JWKS_CACHE_MAX_ENTRIES` | Key cache capacity | `5` |
//! | `AUTH_JWKS_RATE_LIMIT` | Rate limit JWKS fetches | `true` |
//! | `AUTH_JWKS_REQUESTS_PER_MINUTE` | JWKS fetch ceiling | `5` |
//! | `AUTH_JWKS_TIMEOUT_SECS` | JWKS request timeout | `10` |
//! | `AUTH_CLOCK_SKEW_SECS` | `exp`/`nbf` tolerance | `0` |
//! | `AUTH_GATE_ENABLED` | Enforce authentication on the protected routes | `true` |
//! | `AUTH_PROTECTED_ROUTES` | Comma-separated path patterns (`*` suffix = prefix) | `/cars*` |
//! | `AUTH_PROTECTED_METHODS` | `ALL` or comma-separated HTTP methods | `ALL` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Provider URL convention
//!
//! The domain is a bare host. The issuer is always `https://<domain>/` (with
//! the trailing slash) and the JWKS endpoint `https://<domain>/.well-known/jwks.json`.

use std::collections::HashMap;
use std::env;
use std::num::{NonZeroU32, NonZeroUsize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use jsonwebtoken::Algorithm;
use thiserror::Error;
use url::{Host, Url};

use crate::auth::jwks::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_REQUESTS_PER_MINUTE,
};
use crate::auth::{
    AuthGate, Expectations, JwksOptions, JwksResolver, JwtVerifier, MethodSet, RouteRule,
};

pub const AUTH0_DOMAIN_ENV: &str = "AUTH0_DOMAIN";
pub const AUTH0_AUDIENCE_ENV: &str = "AUTH0_AUDIENCE";
pub const AUTH0_CLIENT_ID_ENV: &str = "AUTH0_CLIENT_ID";
pub const AUTH0_ISSUER_ENV: &str = "AUTH0_ISSUER";
pub const AUTH_ALGORITHM_ENV: &str = "AUTH_ALGORITHM";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_JWKS_CACHE_ENV: &str = "AUTH_JWKS_CACHE";
pub const AUTH_JWKS_CACHE_TTL_ENV: &str = "AUTH_JWKS_CACHE_TTL_SECS";
pub const AUTH_JWKS_CACHE_MAX_ENTRIES_ENV: &str = "AUTH_JWKS_CACHE_MAX_ENTRIES";
pub const AUTH_JWKS_RATE_LIMIT_ENV: &str = "AUTH_JWKS_RATE_LIMIT";
pub const AUTH_JWKS_REQUESTS_PER_MINUTE_ENV: &str = "AUTH_JWKS_REQUESTS_PER_MINUTE";
pub const AUTH_JWKS_TIMEOUT_ENV: &str = "AUTH_JWKS_TIMEOUT_SECS";
pub const AUTH_CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";
pub const AUTH_GATE_ENABLED_ENV: &str = "AUTH_GATE_ENABLED";
pub const AUTH_PROTECTED_ROUTES_ENV: &str = "AUTH_PROTECTED_ROUTES";
pub const AUTH_PROTECTED_METHODS_ENV: &str = "AUTH_PROTECTED_METHODS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default protected route pattern.
pub const DEFAULT_PROTECTED_ROUTES: &str = "/cars*";

/// Well-known path of the key discovery endpoint.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalised identity provider host, e.g. `idp.example.com`.
    pub domain: String,
    pub audience: String,
    pub issuer: String,
    pub algorithm: Algorithm,
    pub jwks_url: String,
    pub jwks: JwksOptions,
    pub clock_skew_secs: u64,
    pub gate_enabled: bool,
    pub protected_routes: Vec<RouteRule>,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let domain = normalize_domain(
            get(AUTH0_DOMAIN_ENV)
                .ok_or_else(|| ConfigError::MissingEnvVar(AUTH0_DOMAIN_ENV.to_string()))?,
        )?;

        let audience = get(AUTH0_AUDIENCE_ENV)
            .or_else(|| get(AUTH0_CLIENT_ID_ENV))
            .ok_or_else(|| ConfigError::MissingEnvVar(AUTH0_AUDIENCE_ENV.to_string()))?
            .to_string();

        let issuer = get(AUTH0_ISSUER_ENV)
            .map(str::to_string)
            .unwrap_or_else(|| issuer_for(&domain));

        let algorithm = match get(AUTH_ALGORITHM_ENV) {
            Some(raw) => Algorithm::from_str(raw)
                .map_err(|e| ConfigError::invalid(AUTH_ALGORITHM_ENV, e.to_string()))?,
            None => Algorithm::RS256,
        };
        if matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(ConfigError::invalid(
                AUTH_ALGORITHM_ENV,
                "shared-secret algorithms cannot be verified against a JWKS",
            ));
        }

        let jwks_url = match get(AUTH_JWKS_URL_ENV) {
            Some(raw) => validate_jwks_url(raw)?,
            None => jwks_url_for(&domain),
        };

        let cache_enabled = parse_bool(get(AUTH_JWKS_CACHE_ENV), AUTH_JWKS_CACHE_ENV, true)?;
        let cache_ttl = parse_num(
            get(AUTH_JWKS_CACHE_TTL_ENV),
            AUTH_JWKS_CACHE_TTL_ENV,
            DEFAULT_CACHE_TTL.as_secs(),
        )?;
        let cache_max_entries = parse_num(
            get(AUTH_JWKS_CACHE_MAX_ENTRIES_ENV),
            AUTH_JWKS_CACHE_MAX_ENTRIES_ENV,
            DEFAULT_CACHE_MAX_ENTRIES,
        )?;
        let cache_max_entries = NonZeroUsize::new(cache_max_entries).ok_or_else(|| {
            ConfigError::invalid(AUTH_JWKS_CACHE_MAX_ENTRIES_ENV, "must be at least 1")
        })?;

        let rate_limited =
            parse_bool(get(AUTH_JWKS_RATE_LIMIT_ENV), AUTH_JWKS_RATE_LIMIT_ENV, true)?;
        let requests_per_minute = parse_num(
            get(AUTH_JWKS_REQUESTS_PER_MINUTE_ENV),
            AUTH_JWKS_REQUESTS_PER_MINUTE_ENV,
            DEFAULT_REQUESTS_PER_MINUTE,
        )?;
        let requests_per_minute = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            ConfigError::invalid(AUTH_JWKS_REQUESTS_PER_MINUTE_ENV, "must be at least 1")
        })?;

        let fetch_timeout = parse_num(
            get(AUTH_JWKS_TIMEOUT_ENV),
            AUTH_JWKS_TIMEOUT_ENV,
            DEFAULT_FETCH_TIMEOUT.as_secs(),
        )?;
        if fetch_timeout == 0 {
            return Err(ConfigError::invalid(AUTH_JWKS_TIMEOUT_ENV, "must be at least 1"));
        }

        let clock_skew_secs = parse_num(get(AUTH_CLOCK_SKEW_ENV), AUTH_CLOCK_SKEW_ENV, 0)?;
        let gate_enabled = parse_bool(get(AUTH_GATE_ENABLED_ENV), AUTH_GATE_ENABLED_ENV, true)?;

        let methods = parse_methods(get(AUTH_PROTECTED_METHODS_ENV).unwrap_or("ALL"))?;
        let protected_routes = get(AUTH_PROTECTED_ROUTES_ENV)
            .unwrap_or(DEFAULT_PROTECTED_ROUTES)
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                if pattern.starts_with('/') {
                    Ok(RouteRule::new(pattern, methods.clone()))
                } else {
                    Err(ConfigError::invalid(
                        AUTH_PROTECTED_ROUTES_ENV,
                        format!("pattern '{pattern}' must start with '/'"),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if protected_routes.is_empty() {
            return Err(ConfigError::invalid(
                AUTH_PROTECTED_ROUTES_ENV,
                "at least one route pattern is required",
            ));
        }

        let host = get(HOST_ENV).unwrap_or("0.0.0.0").to_string();
        let port = parse_num(get(PORT_ENV), PORT_ENV, 8080)?;

        Ok(Self {
            domain,
            audience,
            issuer,
            algorithm,
            jwks_url,
            jwks: JwksOptions {
                cache_enabled,
                cache_ttl: Duration::from_secs(cache_ttl),
                cache_max_entries,
                requests_per_minute: rate_limited.then_some(requests_per_minute),
                fetch_timeout: Duration::from_secs(fetch_timeout),
            },
            clock_skew_secs,
            gate_enabled,
            protected_routes,
            host,
            port,
        })
    }

    pub fn expectations(&self) -> Expectations {
        Expectations {
            audience: self.audience.clone(),
            issuer: self.issuer.clone(),
            algorithm: self.algorithm,
        }
    }

    /// Wire resolver, verifier and gate from this configuration.
    pub fn build_gate(&self) -> AuthGate {
        let resolver = JwksResolver::new(self.jwks_url.clone(), self.jwks.clone());
        let verifier = JwtVerifier::new(Arc::new(resolver)).with_leeway(self.clock_skew_secs);
        AuthGate::new(Arc::new(verifier), self.expectations())
            .with_routes(self.protected_routes.clone())
            .enabled(self.gate_enabled)
    }

    /// Log every effective setting. Nothing here is secret.
    pub fn log_summary(&self) {
        tracing::debug!(target: "gate.config", domain = %self.domain, "AUTH0_DOMAIN");
        tracing::debug!(target: "gate.config", audience = %self.audience, "AUTH0_AUDIENCE");
        tracing::debug!(target: "gate.config", issuer = %self.issuer, "AUTH0_ISSUER");
        tracing::debug!(target: "gate.config", algorithm = ?self.algorithm, "AUTH_ALGORITHM");
        tracing::debug!(target: "gate.config", jwks_url = %self.jwks_url, "AUTH_JWKS_URL");
        tracing::debug!(
            target: "gate.config",
            cache_enabled = self.jwks.cache_enabled,
            cache_ttl_secs = self.jwks.cache_ttl.as_secs(),
            cache_max_entries = self.jwks.cache_max_entries.get(),
            requests_per_minute = ?self.jwks.requests_per_minute,
            timeout_secs = self.jwks.fetch_timeout.as_secs(),
            "JWKS options"
        );
        tracing::debug!(
            target: "gate.config",
            enabled = self.gate_enabled,
            clock_skew_secs = self.clock_skew_secs,
            routes = ?self.protected_routes,
            "Authentication gate"
        );
    }
}

/// `https://<domain>/`
pub fn issuer_for(domain: &str) -> String {
    format!("https://{domain}/")
}

/// `https://<domain>/.well-known/jwks.json`
pub fn jwks_url_for(domain: &str) -> String {
    format!("https://{domain}{JWKS_PATH}")
}

fn normalize_domain(raw: &str) -> Result<String, ConfigError> {
    let host = raw
        .strip_prefix("https://")
        .unwrap_or(raw)
        .trim_end_matches('/');

    if host.is_empty() || host.contains("://") || host.contains('/') {
        return Err(ConfigError::invalid(
            AUTH0_DOMAIN_ENV,
            format!("expected a bare host like 'idp.example.com', got '{raw}'"),
        ));
    }

    let parsed = Url::parse(&format!("https://{host}/"))
        .map_err(|e| ConfigError::invalid(AUTH0_DOMAIN_ENV, e.to_string()))?;
    match parsed.host_str() {
        Some(parsed_host) if parsed.path() == "/" && parsed.query().is_none() => {
            // Keep an explicit port, which host_str() drops.
            Ok(match parsed.port() {
                Some(port) => format!("{parsed_host}:{port}"),
                None => parsed_host.to_string(),
            })
        }
        _ => Err(ConfigError::invalid(
            AUTH0_DOMAIN_ENV,
            format!("'{raw}' is not a valid host"),
        )),
    }
}

/// Accept `https` URLs, and plain `http` only for loopback hosts.
fn validate_jwks_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(AUTH_JWKS_URL_ENV, e.to_string()))?;

    let loopback = match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    };

    match url.scheme() {
        "https" => Ok(url.to_string()),
        "http" if loopback => Ok(url.to_string()),
        scheme => Err(ConfigError::invalid(
            AUTH_JWKS_URL_ENV,
            format!("scheme '{scheme}' not allowed; JWKS must be fetched over https"),
        )),
    }
}

fn parse_bool(raw: Option<&str>, var: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            var,
            format!("expected a boolean, got '{raw}'"),
        )),
    }
}

fn parse_num<T>(raw: Option<&str>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| {
            ConfigError::invalid(var, format!("expected a number, got '{raw}': {e}"))
        }),
        None => Ok(default),
    }
}

fn parse_methods(raw: &str) -> Result<MethodSet, ConfigError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(MethodSet::All);
    }

    let methods = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                ConfigError::invalid(AUTH_PROTECTED_METHODS_ENV, format!("unknown method '{m}'"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if methods.is_empty() {
        return Err(ConfigError::invalid(
            AUTH_PROTECTED_METHODS_ENV,
            "expected ALL or a list of methods",
        ));
    }
    Ok(MethodSet::Only(methods))
}
