//! Remote service interaction
//!
//! The reconciler never talks HTTP itself. It builds [`RemoteRequest`]s and
//! hands them to an injected [`RemoteClient`].
//!
//! # Module Structure
//!
//! - [`http`] - reqwest transport, status handling and log sanitizing
//! - [`client`] - [`ServiceClient`], a `RemoteClient` bound to one service endpoint
//!
//! # Example
//!
//! ```ignore
//! use provider_bridge::remote::{ServiceClient, RemoteRequest};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ServiceClient::new("https://api.example.com/pipeline/v2", "token")?;
//!     let trigger = client.call(RemoteRequest::get("/tekton_pipelines/p1/triggers/t1")).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;

pub use client::ServiceClient;
pub use http::HttpClient;

use async_trait::async_trait;
use serde_json::Value;

/// HTTP verb of a remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A shaped request, relative to the service endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Transport or service failure, passed through without interpretation
/// except for the 404 class.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub method: Method,
    pub path: String,
    /// HTTP status, `None` when no response was received
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn status(request: &RemoteRequest, status: u16, message: impl Into<String>) -> Self {
        Self {
            method: request.method,
            path: request.path.clone(),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(request: &RemoteRequest, message: impl Into<String>) -> Self {
        Self {
            method: request.method,
            path: request.path.clone(),
            status: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} {} returned {}: {}",
                self.method, self.path, status, self.message
            ),
            None => write!(f, "{} {} failed: {}", self.method, self.path, self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Client the reconciler issues its calls through. Implementations own
/// transport, auth and TLS; they must not retry on their own.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Issue one call. Empty response bodies come back as `Value::Null`.
    async fn call(&self, request: RemoteRequest) -> Result<Value, RemoteError>;
}
