use async_trait::async_trait;
use http::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use kadmin_core::{AppError, AppResult};

/// Request addressed to the Admin API, relative to the base admin URL.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRequest {
    /// HTTP method.
    pub method: Method,
    /// Unencoded path segments; an empty trailing segment yields a trailing `/`.
    pub segments: Vec<String>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl AdminRequest {
    /// Creates a request without query or body.
    #[must_use]
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Attaches query pairs.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Serializes and attaches a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> AppResult<Self> {
        let body = serde_json::to_value(body).map_err(|error| {
            AppError::Serialization(format!("failed to encode request body: {error}"))
        })?;
        self.body = Some(body);
        Ok(self)
    }

    /// Returns the path joined with `/`, for diagnostics.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Successful Admin API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body, possibly empty.
    pub body: Vec<u8>,
}

impl AdminResponse {
    /// Creates a response from a status and JSON value.
    #[must_use]
    pub fn json_value(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Creates a response with an empty body.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_slice(self.body.as_slice()).map_err(|error| {
            AppError::Serialization(format!("failed to decode response body: {error}"))
        })
    }
}

/// Transport port performing authenticated calls against the Admin API.
///
/// Implementations resolve the base URL, attach credentials and map
/// non-success statuses to `NotFound` or `Service` errors.
#[async_trait]
pub trait AdminTransport: Send + Sync {
    /// Sends one request and returns the successful response.
    async fn send(&self, request: AdminRequest) -> AppResult<AdminResponse>;
}
