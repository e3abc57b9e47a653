//! Service client
//!
//! Binds the HTTP transport to one service endpoint and bearer token.

use super::http::HttpClient;
use super::{RemoteClient, RemoteError, RemoteRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Client for one remote service
#[derive(Clone)]
pub struct ServiceClient {
    pub http: HttpClient,
    pub endpoint: Url,
    token: String,
}

impl ServiceClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: &str, token: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid service endpoint: {}", endpoint))?;
        let http = HttpClient::new()?;

        Ok(Self {
            http,
            endpoint,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl RemoteClient for ServiceClient {
    async fn call(&self, request: RemoteRequest) -> std::result::Result<Value, RemoteError> {
        self.http.send(&self.endpoint, &self.token, &request).await
    }
}

/// Percent-encode one path segment (ids and property names end up in URLs)
pub fn segment(part: &str) -> String {
    urlencoding::encode(part).into_owned()
}
