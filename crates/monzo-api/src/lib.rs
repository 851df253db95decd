//! Monzo API client with OAuth2 token handling
//!
//! Wraps the Monzo HTTP API behind a single [`AuthenticatedApiClient`]:
//!
//! 1. `authorization_url()` builds the browser consent URL with a fresh `state`
//! 2. `exchange_code()` trades the redirect's `code` for access/refresh tokens
//! 3. `get`/`post`/`put`/`delete` attach the bearer token and, on a 401,
//!    refresh once and retry once
//! 4. `logout()` and `test_auth()` cover the two auth-specific endpoints
//!
//! Tokens live in memory only. The HTTP layer is injected through
//! [`Transport`]; [`ReqwestTransport`] is the production implementation.

pub mod client;
pub mod constants;
pub mod error;
pub mod session;
pub mod state;
pub mod token;
pub mod transport;

pub use client::{AuthenticatedApiClient, ClientCredentials, Endpoints};
pub use constants::*;
pub use error::{Error, Result};
pub use session::AuthSession;
pub use state::{AuthorizationCallback, build_authorization_url, generate_state};
pub use token::{TokenResponse, WhoAmI};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
