//! Error types for Monzo API client operations
//!
//! A rejected code or refresh token is not an error here: the token calls
//! report it as `Ok(false)`. These variants cover what the caller cannot
//! recover from by re-authenticating.

/// Errors from Monzo API client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_context() {
        assert_eq!(
            Error::Http("connection refused".into()).to_string(),
            "HTTP request failed: connection refused"
        );
        assert_eq!(
            Error::Decode("expected value at line 1".into()).to_string(),
            "response decode failed: expected value at line 1"
        );
        assert!(
            Error::InvalidUrl("api_base: relative URL without a base".into())
                .to_string()
                .contains("api_base")
        );
    }
}
