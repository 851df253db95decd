//! Shared types for the Monzo API workspace
//!
//! Holds the pieces both the API client library and the login tool need:
//! the `Secret` wrapper for client secrets and tokens, and the configuration
//! error type.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
