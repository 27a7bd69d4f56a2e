//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! Credentials are never read from the TOML; they come from
//! `KIRO_AUTH_TOKEN` and the accounts CSV named here.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "kiro-token-broker.toml";

/// Overrides `pool.region`.
pub const REGION_ENV: &str = "KIRO_REGION";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Separate listener for the admin routes; loopback unless configured.
    #[serde(default = "default_admin_listen_addr")]
    pub admin_listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Token pool and upstream settings
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Secondary credential source, appended to `KIRO_AUTH_TOKEN`.
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_admin_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_max_connections() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    kiro_pool::DEFAULT_CACHE_TTL.as_secs()
}

fn default_csv_path() -> PathBuf {
    PathBuf::from(kiro_auth::DEFAULT_ACCOUNTS_CSV)
}

fn default_region() -> String {
    kiro_auth::DEFAULT_REGION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            admin_listen_addr: default_admin_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            csv_path: default_csv_path(),
            region: default_region(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PoolConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like `load`, but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Config::default().finish()
        }
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(region) = std::env::var(REGION_ENV) {
            let region = region.trim();
            if !region.is_empty() {
                self.pool.region = region.to_owned();
            }
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.server.admin_listen_addr == self.server.listen_addr {
            return Err(common::Error::Config(
                "admin_listen_addr must differ from listen_addr".into(),
            ));
        }
        if self.pool.cache_ttl_secs == 0 {
            return Err(common::Error::Config(
                "cache_ttl_secs must be greater than 0".into(),
            ));
        }
        if self.pool.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.pool.region.trim().is_empty() {
            return Err(common::Error::Config("region must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// Returns `None` when neither is set and the default path applies.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        std::env::var("CONFIG_PATH").ok().map(PathBuf::from)
    }
}
