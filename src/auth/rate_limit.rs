// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token-bucket limiter for outbound JWKS fetches.
//!
//! Attempts beyond the ceiling fail immediately; nothing queues.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Bounds the number of fetches per time window.
///
/// The full `limit` is available as a burst; permits come back evenly over
/// the window.
pub struct FetchRateLimiter {
    limit: NonZeroU32,
    limiter: DefaultDirectRateLimiter,
}

impl fmt::Debug for FetchRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchRateLimiter")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl FetchRateLimiter {
    /// `limit` fetches per `window`. A zero `window` falls back to one minute.
    pub fn new(limit: NonZeroU32, window: Duration) -> Self {
        let quota = Quota::with_period(window / limit.get())
            .map(|quota| quota.allow_burst(limit))
            .unwrap_or_else(|| Quota::per_minute(limit));

        Self {
            limit,
            limiter: RateLimiter::direct(quota),
        }
    }

    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self {
            limit,
            limiter: RateLimiter::direct(Quota::per_minute(limit)),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit.get()
    }

    /// Take one permit. Returns `false` when none is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
