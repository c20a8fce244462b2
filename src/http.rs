//! HTTP Request Client
//!
//! Thin wrapper around `reqwest` used by every control-plane call. One call to
//! [`HttpClient::send`] performs exactly one request and hands back the status
//! code and raw body. Status codes are never interpreted here and nothing is
//! retried; callers decide what a non-200 answer means.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use tracing::debug;

use crate::error::TransportError;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Overrides the client-wide timeout for this request only
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Status code and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Timeout-bounded HTTP client
///
/// TLS verification is fixed when the client is built; the timeout can be
/// overridden per request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    insecure: bool,
}

impl HttpClient {
    /// Build a client
    ///
    /// # Arguments
    ///
    /// * `timeout` - Connect and total request timeout
    /// * `insecure` - Accept invalid TLS certificates
    pub fn new(timeout: Duration, insecure: bool) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| TransportError::from_reqwest("<client builder>", e))?;

        Ok(Self {
            client,
            timeout,
            insecure,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// Perform one request and return its status and body
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on connection, DNS, timeout or body-read
    /// failure. A non-success status is not an error.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        debug!(%method, %url, "sending HTTP request");

        let mut builder = self.client.request(method.clone(), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;

        debug!(%method, %url, status, bytes = body.len(), "received HTTP response");

        Ok(HttpResponse { status, body })
    }
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(2), false).expect("http client")
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://ks", "oauth/token"), "http://ks/oauth/token");
        assert_eq!(join_url("http://ks/", "/oauth/token"), "http://ks/oauth/token");
    }

    #[test]
    fn test_client_settings() {
        let client = HttpClient::new(Duration::from_secs(7), true).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(7));
        assert!(client.is_insecure());
    }

    #[tokio::test]
    async fn test_send_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("x-test", "1"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .send(
                HttpRequest::post(join_url(&server.uri(), "echo"))
                    .header("x-test", "1")
                    .body("payload"),
            )
            .await
            .unwrap();

        assert!(response.is_ok());
        assert_eq!(&response.body[..], b"ok");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client().send(HttpRequest::get(server.uri())).await.unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_ok());
        assert_eq!(&response.body[..], b"busy");
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = client()
            .send(HttpRequest::get(server.uri()).timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 on localhost is not expected to accept connections
        let err = client()
            .send(HttpRequest::get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();

        assert_eq!(err.url, "http://127.0.0.1:9/");
    }
}
