//! Token pool for Kiro refresh-token credentials
//!
//! Turns an ordered list of long-lived credentials into short-lived,
//! usage-metered access tokens. The pool keeps one cache entry per credential,
//! a rotation cursor, and a diagnostic exhausted set, all behind a single
//! lock so that concurrent callers each receive a token that is unexpired and
//! has remaining quota.
//!
//! Selection lifecycle:
//! 1. `AuthService` loads credentials (env JSON first, accounts CSV appended)
//! 2. `TokenPool::get_best_token()` starts at the cursor and lazily refreshes
//!    missing or stale entries through the `TokenExchanger`
//! 3. The fresh token is scored by `compute_remaining_uses` over the
//!    `UsageFetcher` snapshot
//! 4. A usable entry is returned and its local remaining-uses estimate drops by one;
//!    the cursor stays put so the same credential serves until it is unusable
//! 5. Unusable or failing credentials advance the cursor, at most once per
//!    credential per call

pub mod availability;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod service;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use availability::compute_remaining_uses;
pub use cache::{CachedToken, cache_key};
pub use error::{Error, Result};
pub use pool::{DEFAULT_CACHE_TTL, EntryStats, PoolOptions, PoolStats, TokenPool};
pub use service::{AuthService, CredentialSources};
pub use upstream::{BoxFuture, TokenExchanger, UsageFetcher};
