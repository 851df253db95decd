//! Configuration error types

use thiserror::Error;

/// Errors raised while loading and validating configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_mentions_field() {
        let err = Error::Config("client_id must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: client_id must not be empty"
        );
    }

    #[test]
    fn io_error_converts_with_prefix() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "monzo-login.toml").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }

    #[test]
    fn toml_error_converts() {
        let parse_err = toml::from_str::<toml::Table>("client_id = ").unwrap_err();
        let err: Error = parse_err.into();
        assert!(
            matches!(err, Error::Toml(_)),
            "expected Toml variant, got: {err:?}"
        );
    }
}
