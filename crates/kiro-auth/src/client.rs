//! Upstream token refresh and usage-limits client
//!
//! Handles the three endpoint interactions:
//! 1. Social refresh: JSON `{refreshToken}` to the desktop auth service
//! 2. IdC refresh: JSON `{clientId, clientSecret, refreshToken, grantType}` to
//!    the regional OIDC token endpoint
//! 3. Usage limits: GET with the derived access token as Bearer
//!
//! Endpoint URLs are carried in `Endpoints` so tests can point the client at a
//! local server.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::constants::{DEFAULT_TOKEN_LIFETIME_SECS, IDC_AMZ_USER_AGENT, USER_AGENT};
use crate::credentials::{AuthMethod, Credential};
use crate::error::{Error, Result};
use crate::usage::UsageLimits;

/// A derived, short-lived access token.
#[derive(Clone)]
pub struct TokenInfo {
    pub access_token: String,
    /// Monotonic expiry computed from `expiresIn` at exchange time.
    pub expires_at: Instant,
    pub profile_arn: Option<String>,
}

impl TokenInfo {
    /// Time left before expiry, zero once expired.
    pub fn expires_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("profile_arn", &self.profile_arn)
            .finish()
    }
}

/// Upstream endpoint URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub social_refresh: String,
    pub idc_refresh: String,
    pub usage_limits: String,
}

impl Endpoints {
    /// Production endpoints for an AWS region.
    pub fn for_region(region: &str) -> Self {
        Self {
            social_refresh: format!("https://prod.{region}.auth.desktop.kiro.dev/refreshToken"),
            idc_refresh: format!("https://oidc.{region}.amazonaws.com/token"),
            usage_limits: format!("https://q.{region}.amazonaws.com/getUsageLimits"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SocialRefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdcRefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
}

/// Refresh response shared by both auth methods.
///
/// `expires_in` is a delta in seconds. A rotated `refresh_token` may be
/// returned; credentials are immutable after load, so it is not stored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    profile_arn: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// HTTP client for the refresh and usage endpoints.
#[derive(Debug, Clone)]
pub struct KiroClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl KiroClient {
    pub fn new(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Client for a region's production endpoints with a per-request timeout.
    pub fn for_region(region: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;
        Ok(Self::new(http, Endpoints::for_region(region)))
    }

    /// Exchange a credential's refresh token for an access token.
    pub async fn refresh(&self, credential: &Credential) -> Result<TokenInfo> {
        let refresh_token = credential.refresh_token().expose();
        let request = match credential.method() {
            AuthMethod::Social => {
                debug!("refreshing Social token");
                self.http
                    .post(&self.endpoints.social_refresh)
                    .json(&SocialRefreshRequest { refresh_token })
            }
            AuthMethod::IdC {
                client_id,
                client_secret,
            } => {
                debug!("refreshing IdC token");
                self.http
                    .post(&self.endpoints.idc_refresh)
                    .header("x-amz-user-agent", IDC_AMZ_USER_AGENT)
                    .json(&IdcRefreshRequest {
                        client_id,
                        client_secret: client_secret.expose(),
                        refresh_token,
                        grant_type: "refresh_token",
                    })
            }
        };

        let response = request
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the refresh token is revoked or the client is invalid
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::InvalidCredentials(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }
            return Err(Error::TokenExchange(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        let data = response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;

        let lifetime = data.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(lifetime))
            .ok_or_else(|| {
                Error::TokenExchange(format!("expiresIn out of range: {lifetime}"))
            })?;
        Ok(TokenInfo {
            access_token: data.access_token,
            expires_at,
            profile_arn: data.profile_arn,
        })
    }

    /// Fetch the usage-limits snapshot for an access token.
    pub async fn fetch_usage(&self, access_token: &str) -> Result<UsageLimits> {
        let url = format!(
            "{}?origin=AI_EDITOR&resourceType=AGENTIC_REQUEST",
            self.endpoints.usage_limits
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("amz-sdk-invocation-id", uuid::Uuid::new_v4().to_string())
            .header("amz-sdk-request", "attempt=1; max=1")
            .send()
            .await
            .map_err(|e| Error::Http(format!("usage request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Usage(format!("usage endpoint returned {status}: {body}")));
        }

        response
            .json::<UsageLimits>()
            .await
            .map_err(|e| Error::Usage(format!("invalid usage response: {e}")))
    }
}
