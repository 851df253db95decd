//! HTTP transport seam
//!
//! The client never talks to reqwest directly. It hands a fully prepared
//! [`ApiRequest`] to a [`Transport`] and gets back the status and body, so
//! tests can swap in a scripted transport and the composing application
//! decides how the underlying connection pool is configured.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// A request ready to go on the wire, bearer header already attached.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Sent as `application/x-www-form-urlencoded`; empty means no body.
    pub form: Vec<(String, String)>,
}

/// Status and raw body of an API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Exactly 200. Monzo's token, logout and whoami endpoints signal
    /// success with nothing else.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::Decode(format!("status {} body: {e}", self.status)))
    }
}

/// Sends prepared requests to the remote API.
///
/// Uses `Pin<Box<dyn Future>>` so the client can hold an `Arc<dyn Transport>`.
/// Implementations must be safe to share across tasks; the client issues
/// every call through the same instance.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest)
    -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + '_>>;
}

/// Production transport backed by a single shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;
        Ok(Self::new(client))
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + '_>> {
        Box::pin(async move {
            let ApiRequest {
                method,
                url,
                headers,
                form,
            } = request;

            let mut builder = self.client.request(method.clone(), &url).headers(headers);
            if !form.is_empty() {
                builder = builder.form(&form);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Http(format!("{method} {url}: {e}")))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Http(format!("reading {method} {url} body: {e}")))?;

            debug!(%method, url = %url, status, "api response");
            Ok(ApiResponse { status, body })
        })
    }
}
