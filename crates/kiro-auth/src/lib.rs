//! Kiro credential model and upstream auth client
//!
//! Provides the credential configuration types, the loaders that turn operator
//! input (the `KIRO_AUTH_TOKEN` variable, a JSON file, or an accounts CSV) into
//! an ordered list of validated credentials, and the HTTP client that exchanges
//! a credential for a short-lived access token and fetches its usage limits.
//!
//! The pool crate consumes this crate; nothing here holds shared state.
//!
//! Credential flow:
//! 1. `loader::load_from_source()` (the `KIRO_AUTH_TOKEN` value) and
//!    `loader::load_csv()` produce `Vec<Credential>`
//! 2. `KiroClient::refresh()` exchanges a credential for a `TokenInfo`
//! 3. `KiroClient::fetch_usage()` returns the `UsageLimits` snapshot for that token

pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod loader;
pub mod usage;

pub use client::{Endpoints, KiroClient, TokenInfo};
pub use constants::*;
pub use credentials::{AuthMethod, Credential, CredentialRecord};
pub use error::{Error, Result};
pub use loader::{
    load_csv, load_from_source, parse_records, validate_records, warn_deprecated_env,
};
pub use usage::{FreeTrialInfo, UsageBreakdown, UsageLimits};
