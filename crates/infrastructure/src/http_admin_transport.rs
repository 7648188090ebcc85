use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use kadmin_application::{AdminRequest, AdminResponse, AdminTransport};
use kadmin_core::{AppError, AppResult, TransportError, TransportErrorKind};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const ADMIN_TOKEN_HEADER: &str = "kong-admin-token";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_USER_AGENT: &str = concat!("kadmin/", env!("CARGO_PKG_VERSION"));

/// Connection settings for the Admin API.
#[derive(Debug, Clone)]
pub struct AdminTransportConfig {
    base_url: Url,
    workspace: Option<String>,
    admin_token: Option<String>,
    timeout: Duration,
    user_agent: String,
}

impl AdminTransportConfig {
    /// Creates settings for the given base admin URL.
    pub fn new(base_url: &str) -> AppResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed).map_err(|error| {
            AppError::Validation(format!("invalid admin base URL '{trimmed}': {error}"))
        })?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "admin base URL '{trimmed}' must be an http(s) URL"
            )));
        }

        Ok(Self {
            base_url,
            workspace: None,
            admin_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Scopes every request to a workspace path prefix.
    #[must_use]
    pub fn with_workspace(mut self, workspace: Option<String>) -> Self {
        self.workspace = workspace
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        self
    }

    /// Sends the token in the admin token header on every request.
    #[must_use]
    pub fn with_admin_token(mut self, admin_token: Option<String>) -> Self {
        self.admin_token = admin_token.filter(|value| !value.trim().is_empty());
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the base admin URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the user agent sent on every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_str()
    }

    /// Returns the workspace prefix, if any.
    #[must_use]
    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }
}

/// reqwest-backed implementation of the Admin API transport.
pub struct HttpAdminTransport {
    http_client: reqwest::Client,
    config: AdminTransportConfig,
}

impl HttpAdminTransport {
    /// Builds a transport with its own HTTP client.
    pub fn new(config: AdminTransportConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.admin_token.as_deref() {
            let mut value = HeaderValue::from_str(token).map_err(|error| {
                AppError::Validation(format!("admin token is not a valid header value: {error}"))
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(ADMIN_TOKEN_HEADER), value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent())
            .default_headers(headers)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn request_url(&self, request: &AdminRequest) -> AppResult<Url> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                AppError::Validation("admin base URL cannot carry a path".to_owned())
            })?;
            segments.pop_if_empty();
            if let Some(workspace) = self.config.workspace.as_deref() {
                segments.push(workspace);
            }
            segments.extend(request.segments.iter().map(String::as_str));
        }

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
        }

        Ok(url)
    }
}

#[async_trait]
impl AdminTransport for HttpAdminTransport {
    async fn send(&self, request: AdminRequest) -> AppResult<AdminResponse> {
        let url = self.request_url(&request)?;
        let mut builder = self.http_client.request(request.method.clone(), url);
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;

        debug!(
            method = %request.method,
            path = %request.path(),
            status = status.as_u16(),
            "admin api call completed"
        );

        if status.is_success() {
            return Ok(AdminResponse {
                status: status.as_u16(),
                body: body.to_vec(),
            });
        }

        let message = error_message(status, body.as_ref());
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{}: {message}", request.path())));
        }

        warn!(
            method = %request.method,
            path = %request.path(),
            status = status.as_u16(),
            error = %message,
            "admin api call rejected"
        );
        Err(AppError::Service {
            status: status.as_u16(),
            message,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> AppError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_body() || closed_early(&error) {
        TransportErrorKind::PrematureClose
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, format!("admin api request failed: {error}")).into()
}

fn closed_early(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<std::io::Error>()
            && io_error.kind() == std::io::ErrorKind::UnexpectedEof
        {
            return true;
        }
        if cause
            .to_string()
            .contains("connection closed before message completed")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    let from_json = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });
    if let Some(message) = from_json {
        return message;
    }

    let text = String::from_utf8_lossy(body).trim().to_owned();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_owned()
    } else {
        text
    }
}
