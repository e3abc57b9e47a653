//! HTTP utilities for REST API calls

use super::{Method, RemoteError, RemoteRequest};
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Content type for partial updates
const MERGE_PATCH: &str = "application/merge-patch+json";

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull a human readable message out of an error body. Services answer with
/// either `{"errors": [{"message": ..}]}` or `{"message": ..}`.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message"))
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
    });
    message.unwrap_or_else(|| sanitize_for_log(body))
}

/// HTTP client wrapper for service API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("provider-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send one request against `base`, authenticating with `token`
    pub async fn send(
        &self,
        base: &Url,
        token: &str,
        request: &RemoteRequest,
    ) -> std::result::Result<Value, RemoteError> {
        let url = join_url(base, &request.path)
            .map_err(|e| RemoteError::transport(request, format!("invalid URL: {}", e)))?;
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::debug!("{} {} (request id {})", request.method, url, request_id);

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        }
        .bearer_auth(token)
        .header("X-Request-ID", &request_id);

        if let Some(body) = &request.body {
            builder = match request.method {
                Method::Patch => builder
                    .header(reqwest::header::CONTENT_TYPE, MERGE_PATCH)
                    .body(body.to_string()),
                _ => builder.json(body),
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::transport(request, format!("failed to send request: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RemoteError::transport(request, format!("failed to read response body: {}", e))
        })?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            if status.as_u16() == 404 {
                tracing::debug!("{} {} not found (request id {})", request.method, request.path, request_id);
            } else {
                tracing::error!(
                    "API error: {} - {} (request id {})",
                    status,
                    sanitize_for_log(&body),
                    request_id
                );
            }
            return Err(RemoteError::status(request, status.as_u16(), error_message(&body)));
        }

        // Handle empty response
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            RemoteError::status(
                request,
                status.as_u16(),
                format!("failed to parse response JSON: {}", e),
            )
        })
    }
}

/// Append a request path to the service endpoint without dropping the
/// endpoint's own path (`Url::join` would replace its last segment).
fn join_url(base: &Url, path: &str) -> std::result::Result<Url, url::ParseError> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{}/{}", base, path))
}
