//! Bearer-authenticated Monzo API client
//!
//! Every verb goes through the same path: attach `Authorization: Bearer`,
//! send, and on a 401 refresh the access token once and send again. The
//! second response is returned whatever its status, so a failed refresh
//! surfaces to the caller as a second 401 rather than as an error.
//!
//! Refreshes are serialized. When several in-flight calls hit a 401 with
//! the same expired token, the first one refreshes and the rest retry with
//! the token it obtained.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use common::Secret;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{API_BASE_URL, AUTH_BASE_URL, LOGOUT_PATH, TOKEN_PATH, WHOAMI_PATH};
use crate::error::{Error, Result};
use crate::session::AuthSession;
use crate::state::{build_authorization_url, generate_state};
use crate::token::{TokenResponse, WhoAmI, authorization_code_form, refresh_token_form};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// OAuth client registration, fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
}

/// Hosts the client talks to. Defaults to production Monzo.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_base: Url,
    pub auth_base: Url,
}

impl Endpoints {
    pub fn new(api_base: &str, auth_base: &str) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| Error::InvalidUrl(format!("api base {api_base}: {e}")))?;
        let auth_base = Url::parse(auth_base)
            .map_err(|e| Error::InvalidUrl(format!("auth base {auth_base}: {e}")))?;
        Ok(Self {
            api_base,
            auth_base,
        })
    }

    /// `<api_base>/<path>` with exactly one slash at the seam.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: API_BASE_URL.parse().expect("valid default URL"),
            auth_base: AUTH_BASE_URL.parse().expect("valid default URL"),
        }
    }
}

/// OAuth2 client for the Monzo API.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct AuthenticatedApiClient {
    credentials: ClientCredentials,
    endpoints: Endpoints,
    transport: Arc<dyn Transport>,
    session: RwLock<AuthSession>,
    refresh_lock: Mutex<()>,
}

impl AuthenticatedApiClient {
    pub fn new(credentials: ClientCredentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
            transport,
            session: RwLock::new(AuthSession::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Point the client at different hosts (sandbox, test server).
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Snapshot of the current authentication state.
    pub fn session(&self) -> AuthSession {
        self.read_session().clone()
    }

    /// Build the browser authorization URL with a fresh `state` nonce.
    ///
    /// Overwrites the stored `state`. No network I/O.
    pub fn authorization_url(&self) -> String {
        let state = generate_state();
        let url = build_authorization_url(
            &self.endpoints.auth_base,
            &self.credentials.client_id,
            &self.credentials.redirect_uri,
            &state,
        );
        self.write_session().set_state(state);
        debug!(client_id = %self.credentials.client_id, "generated authorization url");
        url
    }

    pub async fn get(&self, path: &str, headers: HeaderMap) -> Result<ApiResponse> {
        self.send_with_retry(Method::GET, path, headers, Vec::new())
            .await
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse> {
        self.send_with_retry(Method::POST, path, HeaderMap::new(), owned_form(form))
            .await
    }

    pub async fn put(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse> {
        self.send_with_retry(Method::PUT, path, HeaderMap::new(), owned_form(form))
            .await
    }

    pub async fn delete(&self, path: &str, form: &[(&str, &str)]) -> Result<ApiResponse> {
        self.send_with_retry(Method::DELETE, path, HeaderMap::new(), owned_form(form))
            .await
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Returns `Ok(false)` and leaves the session untouched unless the token
    /// endpoint answers 200. Goes through the regular POST path, bearer
    /// header and 401 retry included.
    pub async fn exchange_code(&self, code: &str) -> Result<bool> {
        let form = authorization_code_form(
            &self.credentials.client_id,
            self.credentials.client_secret.expose_str(),
            &self.credentials.redirect_uri,
            code,
        );
        let response = self
            .send_with_retry(Method::POST, TOKEN_PATH, HeaderMap::new(), form)
            .await?;
        self.store_token_response(&response, "authorization_code")
    }

    /// Trade the stored refresh token for a new token set.
    ///
    /// Same contract as [`exchange_code`](Self::exchange_code). A rejected
    /// refresh keeps the stale tokens in place.
    pub async fn refresh_access_token(&self) -> Result<bool> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Invalidate the access token server-side. Local tokens are kept.
    pub async fn logout(&self) -> Result<bool> {
        let response = self.post(LOGOUT_PATH, &[]).await?;
        info!(status = response.status, "logout");
        Ok(response.is_ok())
    }

    /// Whether the current access token is accepted by `ping/whoami`.
    pub async fn test_auth(&self) -> Result<bool> {
        let response = self.get(WHOAMI_PATH, HeaderMap::new()).await?;
        Ok(response.is_ok())
    }

    /// Identity behind the current access token, `None` unless whoami
    /// answers 200.
    pub async fn whoami(&self) -> Result<Option<WhoAmI>> {
        let response = self.get(WHOAMI_PATH, HeaderMap::new()).await?;
        if !response.is_ok() {
            debug!(status = response.status, "whoami rejected");
            return Ok(None);
        }
        response.json().map(Some)
    }

    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        form: Vec<(String, String)>,
    ) -> Result<ApiResponse> {
        let url = self.endpoints.api_url(path);

        let sent_token = self.current_access_token();
        let response = self
            .dispatch(&method, &url, &headers, &form, sent_token.as_ref())
            .await?;
        if response.status != StatusCode::UNAUTHORIZED.as_u16() {
            return Ok(response);
        }

        warn!(%method, path, "unauthorized, refreshing access token and retrying once");
        metrics::counter!("monzo_api_unauthorized_retries_total").increment(1);
        self.refresh_after_unauthorized(sent_token.as_ref()).await?;

        let token = self.current_access_token();
        let response = self
            .dispatch(&method, &url, &headers, &form, token.as_ref())
            .await?;
        debug!(%method, path, status = response.status, "retried request");
        Ok(response)
    }

    /// Refresh unless another call already replaced the rejected token.
    ///
    /// The refresh outcome is not checked: the caller retries either way.
    async fn refresh_after_unauthorized(&self, rejected: Option<&Secret<String>>) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.current_access_token();
        if current.as_ref().map(Secret::expose_str) != rejected.map(Secret::expose_str) {
            debug!("access token already refreshed by a concurrent call");
            return Ok(());
        }

        self.refresh_locked().await?;
        Ok(())
    }

    /// Single attempt against the token endpoint. Caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Result<bool> {
        let form = {
            let session = self.read_session();
            refresh_token_form(
                &self.credentials.client_id,
                self.credentials.client_secret.expose_str(),
                session.refresh_token(),
            )
        };
        let url = self.endpoints.api_url(TOKEN_PATH);
        let token = self.current_access_token();

        let response = self
            .dispatch(&Method::POST, &url, &HeaderMap::new(), &form, token.as_ref())
            .await?;
        let refreshed = self.store_token_response(&response, "refresh_token")?;

        let outcome = if refreshed { "success" } else { "rejected" };
        metrics::counter!("monzo_api_token_refresh_total", "outcome" => outcome).increment(1);
        Ok(refreshed)
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        form: &[(String, String)],
        token: Option<&Secret<String>>,
    ) -> Result<ApiResponse> {
        let mut headers = headers.clone();
        set_bearer(&mut headers, token)?;

        let request = ApiRequest {
            method: method.clone(),
            url: url.to_owned(),
            headers,
            form: form.to_vec(),
        };
        self.transport.send(request).await
    }

    fn store_token_response(&self, response: &ApiResponse, grant: &str) -> Result<bool> {
        if !response.is_ok() {
            warn!(grant, status = response.status, "token endpoint rejected grant");
            return Ok(false);
        }

        let token: TokenResponse = response.json()?;
        // Only store access tokens that can go out as a bearer header
        if let Some(access) = token.access_token.as_deref() {
            bearer_value(access)?;
        }
        let user_id = token.user_id.clone();
        self.write_session().apply(token);
        info!(
            grant,
            user_id = user_id.as_deref().unwrap_or("<none>"),
            "stored tokens"
        );
        Ok(true)
    }

    fn current_access_token(&self) -> Option<Secret<String>> {
        self.read_session()
            .access_token()
            .map(|t| Secret::new(t.to_owned()))
    }

    // The session lock is never held across an await, so a poisoned lock
    // still holds a consistent session.
    fn read_session(&self) -> RwLockReadGuard<'_, AuthSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, AuthSession> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Attach the bearer header, or drop it when no token has been obtained yet.
fn set_bearer(headers: &mut HeaderMap, token: Option<&Secret<String>>) -> Result<()> {
    match token {
        Some(token) => {
            headers.insert(AUTHORIZATION, bearer_value(token.expose_str())?);
        }
        None => {
            headers.remove(AUTHORIZATION);
        }
    }
    Ok(())
}

fn bearer_value(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::InvalidHeader(format!("access token: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn owned_form(form: &[(&str, &str)]) -> Vec<(String, String)> {
    form.iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}
