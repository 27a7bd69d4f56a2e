//! Service facade: credential loading plus one pool instance
//!
//! Constructed once at startup and passed explicitly to whatever serves
//! tokens. There is no process-global manager.

use std::path::PathBuf;
use std::sync::Arc;

use kiro_auth::{Credential, TokenInfo};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pool::{PoolOptions, TokenPool};
use crate::upstream::{TokenExchanger, UsageFetcher};

/// Where credentials come from: the `KIRO_AUTH_TOKEN` value (primary) and an
/// accounts CSV (secondary, additive).
#[derive(Debug, Clone)]
pub struct CredentialSources {
    pub auth_token: Option<String>,
    pub csv_path: PathBuf,
}

impl CredentialSources {
    /// Read the primary source from the environment, warning about
    /// deprecated credential variables.
    pub fn from_env(csv_path: impl Into<PathBuf>) -> Self {
        kiro_auth::warn_deprecated_env();
        Self {
            auth_token: std::env::var(kiro_auth::AUTH_TOKEN_ENV).ok(),
            csv_path: csv_path.into(),
        }
    }

    /// Load the combined credential list.
    ///
    /// CSV credentials are appended when the primary source loads. If the
    /// primary source fails, a CSV yielding at least one credential becomes
    /// the sole source; otherwise the primary error is returned.
    pub fn load(&self) -> Result<Vec<Credential>> {
        let primary = kiro_auth::load_from_source(self.auth_token.as_deref());
        let csv = self.load_csv();

        match primary {
            Ok(mut credentials) => {
                if let Some(extra) = csv {
                    info!(
                        primary = credentials.len(),
                        csv = extra.len(),
                        "appending CSV credentials"
                    );
                    credentials.extend(extra);
                }
                Ok(credentials)
            }
            Err(e) => match csv {
                Some(extra) if !extra.is_empty() => {
                    warn!(error = %e, csv = extra.len(), "primary credential source failed, using CSV only");
                    Ok(extra)
                }
                _ => Err(e.into()),
            },
        }
    }

    fn load_csv(&self) -> Option<Vec<Credential>> {
        if !self.csv_path.is_file() {
            debug!(path = %self.csv_path.display(), "no accounts CSV");
            return None;
        }
        match kiro_auth::load_csv(&self.csv_path) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!(path = %self.csv_path.display(), error = %e, "failed to load accounts CSV");
                None
            }
        }
    }
}

/// Loaded credentials plus the pool built from them.
pub struct AuthService {
    pool: Option<Arc<TokenPool>>,
    credentials: Vec<Credential>,
}

impl AuthService {
    /// Load credentials from `sources` and build the pool.
    pub async fn new(
        sources: &CredentialSources,
        options: PoolOptions,
        exchanger: Arc<dyn TokenExchanger>,
        usage: Arc<dyn UsageFetcher>,
    ) -> Result<Self> {
        let credentials = sources.load()?;
        Self::from_credentials(credentials, options, exchanger, usage).await
    }

    /// Build the pool over an already loaded list and run one warm-up
    /// selection. A failed warm-up is logged; the first caller pays the
    /// refresh instead.
    pub async fn from_credentials(
        credentials: Vec<Credential>,
        options: PoolOptions,
        exchanger: Arc<dyn TokenExchanger>,
        usage: Arc<dyn UsageFetcher>,
    ) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::Credential(kiro_auth::Error::Config(
                "no credentials loaded; set KIRO_AUTH_TOKEN or provide an accounts CSV".into(),
            )));
        }

        let pool = Arc::new(TokenPool::new(
            credentials.clone(),
            options,
            exchanger,
            usage,
        ));

        match pool.get_best_token().await {
            Ok(_) => info!(credentials = credentials.len(), "token pool warmed up"),
            Err(e) => warn!(error = %e, "token pool warm-up failed"),
        }

        Ok(Self {
            pool: Some(pool),
            credentials,
        })
    }

    /// A facade with no pool. Every `get_token` fails with `NotInitialized`.
    pub fn uninitialized() -> Self {
        Self {
            pool: None,
            credentials: Vec::new(),
        }
    }

    pub async fn get_token(&self) -> Result<TokenInfo> {
        let pool = self.pool.as_ref().ok_or(Error::NotInitialized)?;
        pool.get_best_token().await
    }

    pub fn pool(&self) -> Option<&Arc<TokenPool>> {
        self.pool.as_ref()
    }

    /// Credentials loaded at construction. Hot-added ones live in the pool only.
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockUpstream, minted_from, social};
    use std::io::Write;

    fn csv_file(dir: &tempfile::TempDir, rows: &[&str]) -> PathBuf {
        let path = dir.path().join("accounts.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "enabled,refresh_token,client_id,client_secret").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        path
    }

    fn tokens(credentials: &[Credential]) -> Vec<&str> {
        credentials
            .iter()
            .map(|c| c.refresh_token().expose().as_str())
            .collect()
    }

    #[test]
    fn csv_is_appended_to_primary_source() {
        let dir = tempfile::tempdir().unwrap();
        let sources = CredentialSources {
            auth_token: Some(r#"[{"refreshToken":"env-1"}]"#.into()),
            csv_path: csv_file(&dir, &["true,csv-1,cid,csec"]),
        };
        let credentials = sources.load().unwrap();
        assert_eq!(tokens(&credentials), vec!["env-1", "csv-1"]);
    }

    #[test]
    fn csv_becomes_sole_source_when_primary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sources = CredentialSources {
            auth_token: None,
            csv_path: csv_file(&dir, &["true,csv-1,cid,csec", "true,csv-2,cid,csec"]),
        };
        let credentials = sources.load().unwrap();
        assert_eq!(tokens(&credentials), vec!["csv-1", "csv-2"]);
    }

    #[test]
    fn primary_error_surfaces_when_csv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sources = CredentialSources {
            auth_token: None,
            csv_path: csv_file(&dir, &["false,csv-off,cid,csec"]),
        };
        let err = sources.load().unwrap_err();
        assert!(err.to_string().contains("KIRO_AUTH_TOKEN"), "got: {err}");
    }

    #[test]
    fn missing_csv_is_ignored() {
        let sources = CredentialSources {
            auth_token: Some(r#"{"refreshToken":"env-only"}"#.into()),
            csv_path: PathBuf::from("/nonexistent/accounts.csv"),
        };
        assert_eq!(tokens(&sources.load().unwrap()), vec!["env-only"]);
    }

    #[tokio::test]
    async fn construction_warms_up_the_pool() {
        let upstream = Arc::new(MockUpstream::new());
        let service = AuthService::from_credentials(
            vec![social("rt0"), social("rt1")],
            PoolOptions::default(),
            upstream.clone(),
            upstream.clone(),
        )
        .await
        .unwrap();

        assert_eq!(upstream.calls("rt0"), 1);
        assert_eq!(service.credentials().len(), 2);

        let token = service.get_token().await.unwrap();
        assert_eq!(minted_from(&token.access_token), "rt0");
        assert_eq!(upstream.calls("rt0"), 1, "warm-up entry is reused");
    }

    #[tokio::test]
    async fn failed_warm_up_is_not_fatal() {
        let upstream = Arc::new(MockUpstream::new());
        upstream.fail("rt0");
        let service = AuthService::from_credentials(
            vec![social("rt0")],
            PoolOptions::default(),
            upstream.clone(),
            upstream.clone(),
        )
        .await
        .unwrap();

        assert!(matches!(
            service.get_token().await,
            Err(Error::NoUsableToken(_))
        ));
        assert!(service.pool().is_some());
    }

    #[tokio::test]
    async fn new_loads_sources_and_builds_pool() {
        let upstream = Arc::new(MockUpstream::new());
        let sources = CredentialSources {
            auth_token: Some(r#"[{"refreshToken":"env-1"},{"refreshToken":"env-2"}]"#.into()),
            csv_path: PathBuf::from("/nonexistent/accounts.csv"),
        };
        let service = AuthService::new(
            &sources,
            PoolOptions::default(),
            upstream.clone(),
            upstream.clone(),
        )
        .await
        .unwrap();

        assert_eq!(service.credentials().len(), 2);
        let pool = service.pool().unwrap();
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn empty_credential_list_is_rejected() {
        let upstream = Arc::new(MockUpstream::new());
        let result = AuthService::from_credentials(
            Vec::new(),
            PoolOptions::default(),
            upstream.clone(),
            upstream.clone(),
        )
        .await;
        assert!(matches!(result, Err(Error::Credential(_))));
    }

    #[tokio::test]
    async fn uninitialized_service_reports_not_initialized() {
        let service = AuthService::uninitialized();
        assert!(matches!(
            service.get_token().await,
            Err(Error::NotInitialized)
        ));
        assert!(service.pool().is_none());
        assert!(service.credentials().is_empty());
    }
}
