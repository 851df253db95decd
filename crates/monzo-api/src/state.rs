//! Anti-forgery `state` values and the authorization redirect URL
//!
//! The authorization URL is opened in the user's browser; Monzo redirects
//! back to `redirect_uri` with `code` and the unchanged `state`. Checking
//! the returned `state` is up to whoever receives the redirect, see
//! [`AuthorizationCallback::verify_state`].

use rand::RngExt;
use reqwest::Url;

use crate::constants::STATE_BYTES;
use crate::error::{Error, Result};

/// Generate a fresh `state` nonce: 32 random bytes, lowercase hex encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Build the browser-facing authorization URL.
///
/// Query values are form-urlencoded, so a redirect URI carrying its own
/// query string survives the round trip.
pub fn build_authorization_url(
    auth_base: &Url,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> String {
    let mut url = auth_base.clone();
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", state);
    url.to_string()
}

/// Query parameters Monzo appends to the redirect URI after consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    pub code: String,
    pub state: Option<String>,
}

impl AuthorizationCallback {
    /// Parse the full redirect URL the browser landed on.
    pub fn from_redirect_url(redirect: &str) -> Result<Self> {
        let url = Url::parse(redirect.trim())
            .map_err(|e| Error::InvalidUrl(format!("redirect URL: {e}")))?;

        let mut code = None;
        let mut state = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::InvalidUrl("redirect URL has no code parameter".into()))?;
        Ok(Self { code, state })
    }

    /// Whether the returned `state` matches the one that was handed out.
    pub fn verify_state(&self, expected: &str) -> bool {
        self.state.as_deref() == Some(expected)
    }
}
