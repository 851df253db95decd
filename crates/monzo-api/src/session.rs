//! In-memory authentication state
//!
//! One `AuthSession` per client, never persisted. The four token fields
//! change together, and only when the token endpoint answered 200.

use common::Secret;

use crate::token::TokenResponse;

/// Authentication state owned by an [`AuthenticatedApiClient`](crate::AuthenticatedApiClient).
///
/// `Debug` output redacts both tokens.
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    state: Option<String>,
    access_token: Option<Secret<String>>,
    refresh_token: Option<Secret<String>>,
    expires_in: Option<u64>,
    user_id: Option<String>,
}

impl AuthSession {
    /// Anti-forgery value from the most recent authorization URL.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(Secret::expose_str)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(Secret::expose_str)
    }

    /// Seconds-to-live hint as returned by the token endpoint. Not tracked
    /// against a clock.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Whether a token exchange has succeeded at some point.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub(crate) fn set_state(&mut self, state: String) {
        self.state = Some(state);
    }

    /// Overwrite all four token fields from a successful token response.
    pub(crate) fn apply(&mut self, token: TokenResponse) {
        self.access_token = token.access_token.map(Secret::new);
        self.refresh_token = token.refresh_token.map(Secret::new);
        self.expires_in = token.expires_in;
        self.user_id = token.user_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty() {
        let session = AuthSession::default();
        assert!(session.state().is_none());
        assert!(session.access_token().is_none());
        assert!(session.refresh_token().is_none());
        assert!(session.expires_in().is_none());
        assert!(session.user_id().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn apply_overwrites_every_token_field() {
        let mut session = AuthSession::default();
        session.apply(TokenResponse {
            access_token: Some("at_1".into()),
            refresh_token: Some("rt_1".into()),
            expires_in: Some(21600),
            user_id: Some("user_1".into()),
        });
        assert_eq!(session.access_token(), Some("at_1"));
        assert_eq!(session.refresh_token(), Some("rt_1"));
        assert_eq!(session.expires_in(), Some(21600));
        assert_eq!(session.user_id(), Some("user_1"));

        // Keys missing from a later response clear the matching fields
        session.apply(TokenResponse {
            access_token: Some("at_2".into()),
            ..TokenResponse::default()
        });
        assert_eq!(session.access_token(), Some("at_2"));
        assert!(session.refresh_token().is_none());
        assert!(session.expires_in().is_none());
        assert!(session.user_id().is_none());
    }

    #[test]
    fn apply_leaves_state_alone() {
        let mut session = AuthSession::default();
        session.set_state("abc".into());
        session.apply(TokenResponse::default());
        assert_eq!(session.state(), Some("abc"));
    }

    #[test]
    fn debug_redacts_tokens() {
        let mut session = AuthSession::default();
        session.apply(TokenResponse {
            access_token: Some("at_secret".into()),
            refresh_token: Some("rt_secret".into()),
            ..TokenResponse::default()
        });
        let debug = format!("{session:?}");
        assert!(!debug.contains("at_secret"), "leaked: {debug}");
        assert!(!debug.contains("rt_secret"), "leaked: {debug}");
    }
}
