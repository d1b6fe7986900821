//! HTTP transport seam.
//!
//! Everything above this module talks to an [`HttpTransport`]; the production
//! implementation wraps a cookie-keeping `reqwest` client.

use crate::error::{Result, SessionError};
use async_trait::async_trait;
use iapd_core::SessionConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER};
use reqwest::header::{UPGRADE_INSECURE_REQUESTS, USER_AGENT};
use reqwest::{redirect, Client, Method};

/// Redirect hops followed within a single request.
const MAX_REDIRECTS: usize = 10;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

/// A request as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// URL-encoded form body, in field order
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    /// Plain GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            form: None,
        }
    }

    /// POST with a form body.
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            form: Some(form),
        }
    }
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that can perform one HTTP round trip.
///
/// Non-2xx responses are returned as responses; turning them into errors is
/// the caller's decision.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and read the full body.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport with a session cookie jar and browser headers.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the client from session settings.
    ///
    /// # Errors
    /// Returns error if a header value is invalid or the client cannot be created.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout())
            .default_headers(default_headers(config)?)
            .build()
            .map_err(|e| SessionError::Client(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

fn default_headers(config: &SessionConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(USER_AGENT, header_value("user_agent", &config.user_agent)?);
    headers.insert(REFERER, header_value("referer", &config.referer)?);
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| SessionError::Client(format!("invalid {name} header: {e}")))
}

fn map_reqwest_error(url: &str, error: &reqwest::Error) -> SessionError {
    if error.is_timeout() {
        SessionError::Timeout {
            url: url.to_string(),
        }
    } else {
        SessionError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method, &request.url);
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&request.url, &e))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(&request.url, &e))?
            .to_vec();

        Ok(HttpResponse { status, url, body })
    }
}
