//! monzo-login: interactive OAuth login against the Monzo API
//!
//! Prints the consent URL, reads back the authorization code (or the whole
//! redirect URL), exchanges it for tokens and reports who the token belongs
//! to. Tokens are never written anywhere.
//!
//! Usage: `monzo-login [--config PATH] [--logout]`

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use monzo_api::{
    AuthenticatedApiClient, AuthorizationCallback, ClientCredentials, Endpoints, ReqwestTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());
    let logout = args.iter().any(|a| a == "--logout");

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        client_id = %config.monzo.client_id,
        api_base_url = %config.monzo.api_base_url,
        timeout_secs = config.http.timeout_secs,
        "configuration loaded"
    );

    let client = build_client(config)?;

    let url = client.authorization_url();
    let expected_state = client
        .session()
        .state()
        .map(str::to_owned)
        .context("authorization url did not record a state")?;
    println!("Open this URL in a browser and approve access:\n\n{url}\n");
    println!("Paste the authorization code or the full redirect URL:");

    let input = read_line().await?;
    let code = extract_code(&input, &expected_state)?;

    if !client.exchange_code(&code).await? {
        anyhow::bail!("authorization code was rejected by the token endpoint");
    }

    match client.whoami().await? {
        Some(who) => println!(
            "Authenticated as user {}",
            who.user_id.as_deref().unwrap_or("<unknown>")
        ),
        None => warn!("token exchange succeeded but whoami did not accept the token"),
    }

    if logout {
        if client.logout().await? {
            println!("Logged out");
        } else {
            warn!("logout was not acknowledged");
        }
    }

    Ok(())
}

fn build_client(config: Config) -> Result<AuthenticatedApiClient> {
    let monzo = config.monzo;
    let endpoints = Endpoints::new(&monzo.api_base_url, &monzo.auth_base_url)?;
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(config.http.timeout_secs))?;
    let client_secret = monzo
        .client_secret
        .context("client secret missing after config load")?;

    let credentials = ClientCredentials {
        client_id: monzo.client_id,
        client_secret,
        redirect_uri: monzo.redirect_uri,
    };
    Ok(AuthenticatedApiClient::new(credentials, Arc::new(transport)).with_endpoints(endpoints))
}

async fn read_line() -> Result<String> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await
        .context("reading from stdin")?
        .context("stdin closed before a code was entered")?;
    Ok(line.trim().to_owned())
}

/// Accept either a bare code or the redirect URL. A redirect URL must carry
/// the `state` handed out with the authorization URL.
fn extract_code(input: &str, expected_state: &str) -> Result<String> {
    if input.is_empty() {
        anyhow::bail!("no authorization code entered");
    }
    if !input.starts_with("http://") && !input.starts_with("https://") {
        return Ok(input.to_owned());
    }

    let callback = AuthorizationCallback::from_redirect_url(input)?;
    if !callback.verify_state(expected_state) {
        anyhow::bail!("state in redirect URL does not match; possible forged callback");
    }
    Ok(callback.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_code_passes_through() {
        assert_eq!(extract_code("eyJhbGciOi", "s1").unwrap(), "eyJhbGciOi");
    }

    #[test]
    fn redirect_url_with_matching_state() {
        let code = extract_code("http://localhost:8080/callback?code=abc&state=s1", "s1").unwrap();
        assert_eq!(code, "abc");
    }

    #[test]
    fn redirect_url_with_wrong_state_is_rejected() {
        let err = extract_code("http://localhost:8080/callback?code=abc&state=s2", "s1")
            .unwrap_err();
        assert!(err.to_string().contains("state"), "got: {err}");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(extract_code("", "s1").is_err());
    }
}
