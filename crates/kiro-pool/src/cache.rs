//! Token cache entries
//!
//! One entry per credential, keyed by `cache_key(index)`. Entries are only
//! created or overwritten by a refresh; selection mutates `remaining_uses`
//! and `last_used_at` in place.

use std::time::Duration;

use kiro_auth::{TokenInfo, UsageLimits};
use tokio::time::Instant;

use crate::availability::compute_remaining_uses;

/// Cache key for the credential at `index`.
///
/// Both the rotation order and refresh derive keys from this one function.
pub fn cache_key(index: usize) -> String {
    format!("token_{index}")
}

/// A derived access token with its locally tracked quota.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: TokenInfo,
    /// `None` when the usage check failed.
    pub usage: Option<UsageLimits>,
    pub remaining_uses: f64,
    pub cached_at: Instant,
    pub last_used_at: Option<Instant>,
}

impl CachedToken {
    /// Cache a freshly exchanged token. Unknown usage scores zero remaining uses.
    pub fn new(token: TokenInfo, usage: Option<UsageLimits>) -> Self {
        let remaining_uses = usage.as_ref().map(compute_remaining_uses).unwrap_or(0.0);
        Self {
            token,
            usage,
            remaining_uses,
            cached_at: Instant::now(),
            last_used_at: None,
        }
    }

    /// Unexpired with quota left. The only admission check selection uses.
    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Instant::now())
    }

    pub fn is_usable_at(&self, now: Instant) -> bool {
        now < self.token.expires_at && self.remaining_uses > 0.0
    }

    /// Older than the cache TTL and due for a refresh.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.is_stale_at(ttl, Instant::now())
    }

    pub fn is_stale_at(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.cached_at) > ttl
    }

    /// Record one selection: stamp `last_used_at` and spend one use.
    pub fn consume(&mut self, now: Instant) {
        self.last_used_at = Some(now);
        if self.remaining_uses > 0.0 {
            self.remaining_uses = (self.remaining_uses - 1.0).max(0.0);
        }
    }
}
