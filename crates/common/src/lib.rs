//! Shared types for the Kiro token broker workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
