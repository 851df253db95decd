//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from MONZO_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Env var holding the OAuth client secret
pub const CLIENT_SECRET_ENV: &str = "MONZO_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub monzo: MonzoConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// OAuth client registration and API hosts
#[derive(Debug, Deserialize)]
pub struct MonzoConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
}

/// Outbound HTTP settings
#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    monzo_api::API_BASE_URL.to_string()
}

fn default_auth_base_url() -> String {
    monzo_api::AUTH_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. MONZO_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.monzo.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        for (field, url) in [
            ("api_base_url", &config.monzo.api_base_url),
            ("auth_base_url", &config.monzo.auth_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.http.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        // Env var takes precedence over file
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.monzo.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.monzo.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.monzo.client_secret = Some(Secret::new(secret));
            }
        }

        if config.monzo.client_secret.is_none() {
            return Err(common::Error::Config(format!(
                "client secret missing: set {CLIENT_SECRET_ENV} or client_secret_file"
            )));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("monzo-login.toml")
    }
}
