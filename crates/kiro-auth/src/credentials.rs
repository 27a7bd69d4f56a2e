//! Credential configuration model
//!
//! `CredentialRecord` is the loose shape operators write (JSON object or CSV
//! row). `Credential` is the validated form the pool works with: the auth
//! method is a closed enum and IdC credentials always carry both client fields.
//! Records that fail validation never become `Credential`s.

use common::Secret;
use serde::Deserialize;

use crate::error::{Error, Result};

/// How a credential's refresh token is exchanged upstream.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Social login refresh token; needs nothing else.
    Social,
    /// IAM Identity Center (OIDC) refresh token with its registered client.
    IdC {
        client_id: String,
        client_secret: Secret<String>,
    },
}

impl AuthMethod {
    /// Method label as operators spell it in configuration.
    pub fn label(&self) -> &'static str {
        match self {
            AuthMethod::Social => "Social",
            AuthMethod::IdC { .. } => "IdC",
        }
    }
}

/// A validated, immutable refresh-capable identity.
#[derive(Debug, Clone)]
pub struct Credential {
    method: AuthMethod,
    refresh_token: Secret<String>,
    disabled: bool,
}

impl Credential {
    /// Build a Social credential. The refresh token must be non-blank.
    pub fn social(refresh_token: impl Into<Secret<String>>) -> Result<Self> {
        let refresh_token = refresh_token.into();
        if refresh_token.is_blank() {
            return Err(Error::CredentialParse("refreshToken is required".into()));
        }
        Ok(Self {
            method: AuthMethod::Social,
            refresh_token,
            disabled: false,
        })
    }

    /// Build an IdC credential. Refresh token, client ID and client secret
    /// must all be non-blank.
    pub fn idc(
        refresh_token: impl Into<Secret<String>>,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
    ) -> Result<Self> {
        let refresh_token = refresh_token.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if refresh_token.is_blank() {
            return Err(Error::CredentialParse("refreshToken is required".into()));
        }
        if client_id.trim().is_empty() || client_secret.is_blank() {
            return Err(Error::CredentialParse(
                "IdC credentials require clientId and clientSecret".into(),
            ));
        }
        Ok(Self {
            method: AuthMethod::IdC {
                client_id,
                client_secret,
            },
            refresh_token,
            disabled: false,
        })
    }

    /// Mark the credential disabled. Disabled credentials are filtered by the
    /// loaders and refused again by the pool's refresh.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn method(&self) -> &AuthMethod {
        &self.method
    }

    pub fn refresh_token(&self) -> &Secret<String> {
        &self.refresh_token
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// A credential as written in `KIRO_AUTH_TOKEN` JSON.
///
/// All fields are optional at this stage; `into_credential` enforces the
/// per-method requirements. No `Debug` derive: it would print secrets.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl CredentialRecord {
    /// Validate into a `Credential`.
    ///
    /// A missing or empty `auth` means Social. `auth` is matched
    /// case-insensitively; unknown methods are rejected.
    pub fn into_credential(self) -> Result<Credential> {
        let refresh_token = self.refresh_token.unwrap_or_default();
        let auth = self.auth.unwrap_or_default();
        let auth = auth.trim();

        let credential = if auth.is_empty() || auth.eq_ignore_ascii_case("social") {
            Credential::social(refresh_token)?
        } else if auth.eq_ignore_ascii_case("idc") {
            Credential::idc(
                refresh_token,
                self.client_id.unwrap_or_default(),
                self.client_secret.unwrap_or_default(),
            )?
        } else {
            return Err(Error::CredentialParse(format!(
                "unsupported auth method {auth:?} (expected Social or IdC)"
            )));
        };

        Ok(credential.with_disabled(self.disabled))
    }
}
