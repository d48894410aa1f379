//! HTTP transport.
//!
//! The operation client only needs three verbs: a JSON `GET`, a JSON `POST`
//! and a `POST` whose body is handed back as a stream of chunks. They live
//! behind [`Transport`] so the client can be driven by a test double; the
//! production implementation is [`HttpTransport`] on top of reqwest.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::warn;

use crate::client::{ClientError, TransportError};
use crate::options::TransportOptions;

/// Response body chunks in arrival order. A failure mid-body is an `Err`
/// item; the end of the stream is the end of the body.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Request/response exchange used by [`GeminiClient`](crate::providers::GeminiClient).
///
/// URLs arrive fully composed, query string included.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET` and return the whole response body.
    async fn get(&self, url: &str) -> Result<Bytes, TransportError>;

    /// `POST` a JSON body and return the whole response body.
    async fn post(&self, url: &str, body: &Value) -> Result<Bytes, TransportError>;

    /// `POST` a JSON body and return the response body as it arrives.
    async fn post_stream(&self, url: &str, body: &Value) -> Result<ChunkStream, TransportError>;
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> Result<Self, ClientError> {
        let client = build_http_client(options).map_err(TransportError::Http)?;
        Ok(Self {
            client,
            extra_headers: options.extra_headers.clone(),
        })
    }

    fn json_post(&self, url: &str, body: &Value) -> RequestBuilder {
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        add_extra_headers(req, &self.extra_headers)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, TransportError> {
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await;
            return Err(error_from_response(status.as_u16(), body));
        }
        Ok(response)
    }
}

/// Map a failed response to an error. If the body itself could not be read,
/// the read failure is kept in the `Status` body.
fn error_from_response<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> TransportError {
    match body {
        Ok(body) => {
            warn!(status, "Gemini request failed");
            TransportError::from_error_body(status, &body)
        }
        Err(e) => {
            warn!(status, error = %e, "Gemini request failed; error body unreadable");
            TransportError::Status {
                status,
                body: format!("failed to read error body: {e}"),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        let req = add_extra_headers(self.client.get(url), &self.extra_headers);
        let response = self.send(req).await?;
        Ok(response.bytes().await?)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Bytes, TransportError> {
        let response = self.send(self.json_post(url, body)).await?;
        Ok(response.bytes().await?)
    }

    async fn post_stream(&self, url: &str, body: &Value) -> Result<ChunkStream, TransportError> {
        let response = self.send(self.json_post(url, body)).await?;
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(Box::pin(chunks))
    }
}

/// Build a configured HTTP client from transport options.
///
/// An unparsable proxy URL is logged and ignored.
pub fn build_http_client(options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy URL"),
        }
    }

    builder.build()
}

/// Add extra headers to a request if any are configured.
///
/// # Example
/// ```ignore
/// let mut req = client.post(url);
/// req = add_extra_headers(req, &transport_options.extra_headers);
/// ```
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let options = TransportOptions::default().with_timeout(Duration::from_secs(30));
        assert!(build_http_client(&options).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let options =
            TransportOptions::default().with_proxy("http://proxy.example.com:8080".to_string());
        assert!(build_http_client(&options).is_ok());
    }

    #[test]
    fn test_unreadable_error_body_is_reported() {
        match error_from_response(502, Err::<String, _>("connection reset")) {
            TransportError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "failed to read error body: connection reset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_readable_error_body_uses_envelope() {
        let body = r#"{"error":{"code":403,"message":"Permission denied"}}"#.to_string();
        assert!(matches!(
            error_from_response::<&str>(403, Ok(body)),
            TransportError::Api { code: 403, .. }
        ));
    }

    #[test]
    fn test_extra_headers_are_applied() {
        let headers = Some(HashMap::from([(
            "x-goog-user-project".to_string(),
            "demo".to_string(),
        )]));
        let req = add_extra_headers(Client::new().get("http://localhost/"), &headers)
            .build()
            .unwrap();
        assert_eq!(req.headers()["x-goog-user-project"], "demo");
    }
}
