//! HTTP access for the resolver.
//!
//! The resolver only ever needs `GET` with per-call control over redirects, so
//! that is the whole of the `HttpClient` seam. `ReqwestHttpClient` is the
//! production implementation; tests script their own.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use livewatch_common::config::AppConfig;
use livewatch_common::error::HttpError;
use livewatch_common::types::StatusClass;

/// Status code and body text of a platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_code(self.status)
    }
}

/// Minimal HTTP capability consumed by `LiveResolver`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET. With `follow_redirects == false` a 3xx is returned as-is.
    async fn get(&self, url: &str, follow_redirects: bool) -> Result<HttpResponse, HttpError>;
}

/// Settings for building a `ReqwestHttpClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy_url: Option<String>,
}

impl HttpClientConfig {
    /// Settings for the identity-resolution client (goes through the proxy, if any).
    pub fn for_resolution(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.http_timeout_secs),
            user_agent: config.user_agent.clone(),
            proxy_url: config.proxy_url.clone(),
        }
    }

    /// Settings for the polling client (always direct).
    pub fn for_polling(config: &AppConfig) -> Self {
        Self {
            proxy_url: None,
            ..Self::for_resolution(config)
        }
    }
}

/// `HttpClient` backed by two reqwest clients, one per redirect policy.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    following: Client,
    non_following: Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self, HttpError> {
        Ok(Self {
            following: Self::build(config, reqwest::redirect::Policy::limited(10))?,
            non_following: Self::build(config, reqwest::redirect::Policy::none())?,
        })
    }

    fn build(
        config: &HttpClientConfig,
        policy: reqwest::redirect::Policy,
    ) -> Result<Client, HttpError> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(policy);

        if !config.timeout.is_zero() {
            builder = builder.timeout(config.timeout);
        }

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| HttpError::Request(format!("invalid proxy '{proxy_url}': {e}")))?;
            builder = builder.proxy(proxy);
            tracing::info!(proxy = %proxy_url, "HTTP client using proxy");
        }

        builder
            .build()
            .map_err(|e| HttpError::Request(e.to_string()))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, follow_redirects: bool) -> Result<HttpResponse, HttpError> {
        let client = if follow_redirects {
            &self.following
        } else {
            &self.non_following
        };

        let response = client.get(url).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| match classify(e) {
                HttpError::Request(msg) => HttpError::Body(msg),
                other => other,
            })?;

        tracing::debug!(url, status, bytes = body.len(), "GET");
        Ok(HttpResponse { status, body })
    }
}

/// Separate dropped connections from every other transport failure.
fn classify(err: reqwest::Error) -> HttpError {
    if is_connection_aborted(&err) {
        HttpError::ConnectionAborted(err.to_string())
    } else {
        HttpError::Request(err.to_string())
    }
}

fn is_connection_aborted(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("connection closed") || text.contains("connection reset") {
            return true;
        }
        source = cause.source();
    }
    false
}
