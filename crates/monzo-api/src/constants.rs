//! Monzo API endpoints and paths
//!
//! The authorization host is browser-facing only; everything this crate
//! sends over HTTP goes to the API host.

/// Base URL for every authenticated API call and the token endpoint
pub const API_BASE_URL: &str = "https://api.monzo.com";

/// Browser-facing authorization page the user is redirected to
pub const AUTH_BASE_URL: &str = "https://auth.monzo.com/";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_PATH: &str = "oauth2/token";

/// Invalidates the current access token server-side
pub const LOGOUT_PATH: &str = "oauth2/logout";

/// Identity probe, answers 200 only for a valid bearer token
pub const WHOAMI_PATH: &str = "ping/whoami";

/// Number of random bytes in the anti-forgery `state` value (64 hex chars)
pub const STATE_BYTES: usize = 32;
