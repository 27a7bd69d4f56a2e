//! Collaborator seams for token exchange and usage lookup
//!
//! The pool never talks HTTP itself. It holds `Arc<dyn TokenExchanger>` and
//! `Arc<dyn UsageFetcher>`; `KiroClient` implements both for production and
//! tests substitute scripted fakes.
//!
//! Methods return boxed futures so the traits stay dyn-compatible.

use std::future::Future;
use std::pin::Pin;

use kiro_auth::{Credential, KiroClient, TokenInfo, UsageLimits};

/// Boxed, sendable future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Exchanges a credential's refresh secret for an access token.
pub trait TokenExchanger: Send + Sync {
    fn exchange<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, kiro_auth::Result<TokenInfo>>;
}

/// Fetches the usage snapshot for an access token.
pub trait UsageFetcher: Send + Sync {
    fn fetch_usage<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, kiro_auth::Result<UsageLimits>>;
}

impl TokenExchanger for KiroClient {
    fn exchange<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, kiro_auth::Result<TokenInfo>> {
        Box::pin(self.refresh(credential))
    }
}

impl UsageFetcher for KiroClient {
    fn fetch_usage<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, kiro_auth::Result<UsageLimits>> {
        Box::pin(KiroClient::fetch_usage(self, access_token))
    }
}
