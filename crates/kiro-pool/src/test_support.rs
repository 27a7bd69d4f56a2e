//! Scripted upstream fake shared by pool and service tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use kiro_auth::{Credential, TokenInfo, UsageBreakdown, UsageLimits};
use tokio::time::Instant;

use crate::upstream::{BoxFuture, TokenExchanger, UsageFetcher};

/// How the fake answers for one refresh token.
#[derive(Debug, Clone)]
pub struct Script {
    pub exchange_fails: bool,
    /// `None` makes the usage check fail.
    pub credits: Option<f64>,
    pub lifetime: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            exchange_fails: false,
            credits: Some(10.0),
            lifetime: Duration::from_secs(3600),
        }
    }
}

/// Exchanges `rt` for `at-<rt>#<n>` where `n` counts exchanges of that token,
/// and reports usage per the script of the refresh token it was minted from.
#[derive(Default)]
pub struct MockUpstream {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, refresh_token: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(refresh_token.to_string(), script);
    }

    pub fn fail(&self, refresh_token: &str) {
        self.script(
            refresh_token,
            Script {
                exchange_fails: true,
                ..Default::default()
            },
        );
    }

    pub fn credits(&self, refresh_token: &str, credits: f64) {
        self.script(
            refresh_token,
            Script {
                credits: Some(credits),
                ..Default::default()
            },
        );
    }

    /// Number of exchange attempts for a refresh token, failed ones included.
    pub fn calls(&self, refresh_token: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(refresh_token)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn script_for(&self, refresh_token: &str) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get(refresh_token)
            .cloned()
            .unwrap_or_default()
    }
}

/// Refresh token an access token minted by `MockUpstream` came from.
pub fn minted_from(access_token: &str) -> &str {
    access_token
        .strip_prefix("at-")
        .and_then(|rest| rest.rsplit_once('#'))
        .map(|(rt, _)| rt)
        .unwrap_or_default()
}

impl TokenExchanger for MockUpstream {
    fn exchange<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, kiro_auth::Result<TokenInfo>> {
        Box::pin(async move {
            let rt = credential.refresh_token().expose().clone();
            let n = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(rt.clone()).or_insert(0);
                *n += 1;
                *n
            };
            let script = self.script_for(&rt);
            if script.exchange_fails {
                return Err(kiro_auth::Error::InvalidCredentials(format!(
                    "refresh token rejected: {rt}"
                )));
            }
            Ok(TokenInfo {
                access_token: format!("at-{rt}#{n}"),
                expires_at: Instant::now() + script.lifetime,
                profile_arn: None,
            })
        })
    }
}

impl UsageFetcher for MockUpstream {
    fn fetch_usage<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, kiro_auth::Result<UsageLimits>> {
        Box::pin(async move {
            let script = self.script_for(minted_from(access_token));
            match script.credits {
                Some(credits) => Ok(UsageLimits {
                    usage_breakdown_list: vec![UsageBreakdown {
                        resource_type: "CREDIT".into(),
                        usage_limit_with_precision: credits,
                        current_usage_with_precision: 0.0,
                        free_trial_info: None,
                    }],
                }),
                None => Err(kiro_auth::Error::Usage("usage endpoint returned 500".into())),
            }
        })
    }
}

pub fn social(refresh_token: &str) -> Credential {
    Credential::social(refresh_token).unwrap()
}
