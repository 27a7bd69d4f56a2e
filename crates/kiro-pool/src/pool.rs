//! Token pool manager: sticky rotation with lazy refresh
//!
//! The pool owns one `PoolState` behind a single `RwLock`. Every operation
//! that reads the cache for selection or mutates anything takes the write
//! half for its whole duration, including the upstream refresh calls it
//! triggers. Only `stats()` takes the read half.
//!
//! Selection is sticky: a successful pick leaves the cursor on the same
//! credential, so it keeps serving until it expires or runs out of uses.
//! A credential that fails to refresh or is unusable advances the cursor.
//! One call visits each credential at most once, then gives up.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kiro_auth::{Credential, TokenInfo};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{CachedToken, cache_key};
use crate::error::{Error, Result};
use crate::metrics;
use crate::upstream::{TokenExchanger, UsageFetcher};

/// How long a cache entry is trusted before selection refreshes it.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Pool tuning.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub cache_ttl: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Everything the pool mutates. Only touched with the pool lock held.
struct PoolState {
    cache: HashMap<String, CachedToken>,
    credentials: Vec<Credential>,
    rotation: Vec<String>,
    cursor: usize,
    /// Keys that failed selection and have not refreshed successfully since.
    /// Reported in stats; never consulted by selection.
    exhausted: BTreeSet<String>,
    last_full_refresh: Option<Instant>,
}

impl PoolState {
    fn advance(&mut self) {
        if !self.rotation.is_empty() {
            self.cursor = (self.cursor + 1) % self.rotation.len();
        }
    }
}

fn rotation_order(credentials: &[Credential]) -> Vec<String> {
    let order: Vec<String> = (0..credentials.len()).map(cache_key).collect();
    debug!(credentials = credentials.len(), ?order, "generated rotation order");
    order
}

/// Per-entry view for health reporting. Never includes tokens.
#[derive(Debug, Clone, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub auth: &'static str,
    pub cached: bool,
    pub usable: bool,
    pub exhausted: bool,
    pub remaining_uses: Option<f64>,
    pub expires_in_secs: Option<u64>,
    pub cached_secs_ago: Option<u64>,
    pub last_used_secs_ago: Option<u64>,
}

/// Pool summary for the health endpoint.
///
/// Status mapping: no usable cached entry → unhealthy, any exhausted key →
/// degraded, otherwise healthy.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub status: &'static str,
    pub credentials: usize,
    pub rotation_len: usize,
    pub cursor: usize,
    pub cached: usize,
    pub usable: usize,
    pub exhausted: Vec<String>,
    pub last_full_refresh_secs_ago: Option<u64>,
    pub entries: Vec<EntryStats>,
}

/// Pool of Kiro credentials producing usable access tokens.
pub struct TokenPool {
    state: RwLock<PoolState>,
    cache_ttl: Duration,
    exchanger: Arc<dyn TokenExchanger>,
    usage: Arc<dyn UsageFetcher>,
}

impl TokenPool {
    /// Build a pool over `credentials` in the given order. The cache starts
    /// empty; entries are refreshed on first selection.
    pub fn new(
        credentials: Vec<Credential>,
        options: PoolOptions,
        exchanger: Arc<dyn TokenExchanger>,
        usage: Arc<dyn UsageFetcher>,
    ) -> Self {
        let rotation = rotation_order(&credentials);
        info!(
            credentials = credentials.len(),
            cache_ttl_secs = options.cache_ttl.as_secs(),
            "token pool initialized"
        );
        Self {
            state: RwLock::new(PoolState {
                cache: HashMap::new(),
                credentials,
                rotation,
                cursor: 0,
                exhausted: BTreeSet::new(),
                last_full_refresh: None,
            }),
            cache_ttl: options.cache_ttl,
            exchanger,
            usage,
        }
    }

    /// Return an access token that is unexpired and has uses left.
    ///
    /// Starts at the cursor and visits each credential at most once,
    /// refreshing missing or stale entries. On success the entry's
    /// remaining-uses estimate drops by one and the cursor is left in place.
    pub async fn get_best_token(&self) -> Result<TokenInfo> {
        let mut state = self.state.write().await;

        let Some(key) = self.select_unlocked(&mut state).await else {
            metrics::record_selection("no_usable_token");
            return Err(Error::NoUsableToken(format!(
                "all {} credentials unusable ({} exhausted)",
                state.credentials.len(),
                state.exhausted.len()
            )));
        };

        let entry = state
            .cache
            .get_mut(&key)
            .ok_or_else(|| Error::NoUsableToken(format!("selected entry {key} vanished")))?;
        entry.consume(Instant::now());
        metrics::record_selection("ok");
        debug!(
            cache_key = %key,
            remaining_uses = entry.remaining_uses,
            "token selected"
        );
        Ok(entry.token.clone())
    }

    /// Refresh the entry for one credential.
    pub async fn refresh(&self, index: usize) -> Result<()> {
        let mut state = self.state.write().await;
        self.refresh_unlocked(&mut state, index).await
    }

    /// Refresh every credential in order. Per-credential failures are logged,
    /// not returned.
    pub async fn refresh_all(&self) {
        let mut state = self.state.write().await;
        self.refresh_all_unlocked(&mut state).await;
    }

    /// Append credentials, regenerate the rotation order and refresh the
    /// whole pool before returning. Returns the number added.
    ///
    /// Existing indices keep their keys and the cursor is left where it was,
    /// so it still points at the same credential.
    pub async fn add_credentials(&self, credentials: Vec<Credential>) -> usize {
        let added = credentials.len();
        if added == 0 {
            debug!("no credentials to add");
            return 0;
        }

        let mut state = self.state.write().await;
        state.credentials.extend(credentials);
        state.rotation = rotation_order(&state.credentials);
        info!(added, total = state.credentials.len(), "credentials added to pool");

        self.refresh_all_unlocked(&mut state).await;
        added
    }

    /// Load IdC credentials from an accounts CSV and hot-add them.
    pub async fn add_credentials_from_csv(&self, path: &Path) -> Result<usize> {
        let credentials = kiro_auth::load_csv(path)?;
        Ok(self.add_credentials(credentials).await)
    }

    /// Number of credentials in the pool.
    pub async fn len(&self) -> usize {
        self.state.read().await.credentials.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of the pool for health reporting.
    pub async fn stats(&self) -> PoolStats {
        let state = self.state.read().await;
        let now = Instant::now();
        let secs_since = |t: Instant| now.saturating_duration_since(t).as_secs();

        let entries: Vec<EntryStats> = state
            .rotation
            .iter()
            .zip(state.credentials.iter())
            .map(|(key, credential)| {
                let entry = state.cache.get(key);
                EntryStats {
                    key: key.clone(),
                    auth: credential.method().label(),
                    cached: entry.is_some(),
                    usable: entry.is_some_and(|e| e.is_usable_at(now)),
                    exhausted: state.exhausted.contains(key),
                    remaining_uses: entry.map(|e| e.remaining_uses),
                    expires_in_secs: entry.map(|e| {
                        e.token.expires_at.saturating_duration_since(now).as_secs()
                    }),
                    cached_secs_ago: entry.map(|e| secs_since(e.cached_at)),
                    last_used_secs_ago: entry.and_then(|e| e.last_used_at).map(secs_since),
                }
            })
            .collect();

        let usable = entries.iter().filter(|e| e.usable).count();
        let status = if usable == 0 {
            "unhealthy"
        } else if !state.exhausted.is_empty() {
            "degraded"
        } else {
            "healthy"
        };

        PoolStats {
            status,
            credentials: state.credentials.len(),
            rotation_len: state.rotation.len(),
            cursor: state.cursor,
            cached: state.cache.len(),
            usable,
            exhausted: state.exhausted.iter().cloned().collect(),
            last_full_refresh_secs_ago: state.last_full_refresh.map(secs_since),
            entries,
        }
    }

    /// Find the key of the entry to serve. Caller holds the write lock.
    async fn select_unlocked(&self, state: &mut PoolState) -> Option<String> {
        let n = state.rotation.len();

        if n == 0 {
            let now = Instant::now();
            return state
                .cache
                .iter()
                .find(|(_, e)| !e.is_stale_at(self.cache_ttl, now) && e.is_usable_at(now))
                .map(|(key, _)| key.clone());
        }

        for _ in 0..n {
            let index = state.cursor;
            let key = state.rotation[index].clone();

            let needs_refresh = state
                .cache
                .get(&key)
                .is_none_or(|e| e.is_stale(self.cache_ttl));
            if needs_refresh {
                if let Err(e) = self.refresh_unlocked(state, index).await {
                    warn!(cache_key = %key, index, error = %e, "token refresh failed, trying next credential");
                    state.exhausted.insert(key);
                    state.advance();
                    continue;
                }
            }

            if let Some(entry) = state.cache.get(&key).filter(|e| e.is_usable()) {
                debug!(
                    cache_key = %key,
                    index,
                    remaining_uses = entry.remaining_uses,
                    "selected credential"
                );
                return Some(key);
            }

            state.exhausted.insert(key.clone());
            state.advance();
            debug!(
                exhausted_key = %key,
                next_index = state.cursor,
                "token unusable, switching to next credential"
            );
        }

        warn!(
            total = n,
            exhausted = state.exhausted.len(),
            "no usable token in rotation"
        );
        None
    }

    /// Exchange and score one credential, overwriting its cache entry.
    /// Caller holds the write lock.
    async fn refresh_unlocked(&self, state: &mut PoolState, index: usize) -> Result<()> {
        let credential = state
            .credentials
            .get(index)
            .ok_or(Error::IndexOutOfRange(index))?;
        let key = cache_key(index);
        if credential.is_disabled() {
            return Err(Error::CredentialDisabled(key));
        }

        let started = Instant::now();
        let token = match self.exchanger.exchange(credential).await {
            Ok(token) => {
                metrics::record_refresh("ok", started.elapsed().as_secs_f64());
                token
            }
            Err(e) => {
                metrics::record_refresh("error", started.elapsed().as_secs_f64());
                return Err(Error::RefreshFailed(e.to_string()));
            }
        };

        let usage = match self.usage.fetch_usage(&token.access_token).await {
            Ok(usage) => {
                metrics::record_usage_check("ok");
                Some(usage)
            }
            Err(e) => {
                metrics::record_usage_check("error");
                warn!(cache_key = %key, error = %e, "usage check failed, treating remaining uses as 0");
                None
            }
        };

        let entry = CachedToken::new(token, usage);
        debug!(
            cache_key = %key,
            remaining_uses = entry.remaining_uses,
            "token cache updated"
        );
        state.exhausted.remove(&key);
        state.cache.insert(key, entry);
        Ok(())
    }

    async fn refresh_all_unlocked(&self, state: &mut PoolState) {
        debug!(credentials = state.credentials.len(), "refreshing all tokens");
        for index in 0..state.credentials.len() {
            if let Err(e) = self.refresh_unlocked(state, index).await {
                warn!(index, error = %e, "token refresh failed");
            }
        }
        state.last_full_refresh = Some(Instant::now());
    }
}
