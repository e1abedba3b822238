// Gateway module: a small blocking HTTP client that talks to the remote
// agent service and normalizes transport and HTTP-status failures into the
// `ApiError` taxonomy. Network access is behind the `Backend` trait so the
// orchestrator can be exercised against a fake in tests.

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::error::{ApiError, Result};

/// AI-backed endpoints can take a while to answer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Header carrying the deployment-level service access key.
const ACCESS_KEY_HEADER: &str = "x-functions-key";

const CLIENT_IDENT: &str = concat!("manai-cli/", env!("CARGO_PKG_VERSION"));

/// Per-call options decided by the orchestrator: which credentials ride
/// along with the request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOpts {
    /// Bearer token for the `Authorization` header, if this call is made
    /// on behalf of a logged-in user.
    pub bearer: Option<String>,
    /// Whether to attach the service access key (on for everything today,
    /// kept explicit because the two credentials are distinct concerns).
    pub service_key: bool,
}

impl CallOpts {
    /// Unauthenticated call (register, login, connection test).
    pub fn public() -> Self {
        Self { bearer: None, service_key: true }
    }

    /// Call on behalf of the logged-in user.
    pub fn authed(token: impl Into<String>) -> Self {
        Self { bearer: Some(token.into()), service_key: true }
    }
}

/// The seam between the orchestrator and the network.
pub trait Backend {
    /// Perform one call against a logical endpoint. On 2xx the body is
    /// returned as parsed JSON; a non-JSON 2xx body is wrapped as
    /// `{"success": true, "message": <text>}` since the service is allowed
    /// to answer in plain text.
    fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
        opts: CallOpts,
    ) -> Result<Value>;
}

/// Blocking HTTP implementation of [`Backend`].
pub struct HttpGateway {
    client: Client,
    base_url: String,
    access_key: Option<String>,
}

impl HttpGateway {
    /// Build a gateway for the given base URL. The access key is a
    /// deployment secret and therefore always injected, never compiled in.
    pub fn new(base_url: impl Into<String>, access_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key,
        })
    }

    fn headers(&self, opts: &CallOpts) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_IDENT));
        if opts.service_key {
            if let Some(key) = &self.access_key {
                let value = HeaderValue::from_str(key)
                    .map_err(|_| ApiError::Connection("invalid access key value".into()))?;
                headers.insert(ACCESS_KEY_HEADER, value);
            }
        }
        if let Some(token) = &opts.bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::Connection("invalid token value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

impl Backend for HttpGateway {
    fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
        opts: CallOpts,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        log::debug!("{method} {url}");

        let mut request = self
            .client
            .request(method, &url)
            .headers(self.headers(&opts)?);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().unwrap_or_default();

        if !status.is_success() {
            return Err(classify_status(status, endpoint, &text));
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            // Plain-text answers are valid; wrap them in the minimal shape.
            Err(_) => Ok(json!({ "success": true, "message": text })),
        }
    }
}

fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Connection(err.to_string())
    }
}

fn classify_status(status: StatusCode, endpoint: &str, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthenticated,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        StatusCode::NOT_FOUND => ApiError::NotFound(endpoint.to_string()),
        StatusCode::TOO_MANY_REQUESTS => ApiError::QuotaExceeded,
        s if s.is_server_error() => ApiError::Server(s.as_u16()),
        s => ApiError::UnexpectedStatus(s.as_u16(), body.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_matches_the_taxonomy() {
        let kind = |code: u16| classify_status(StatusCode::from_u16(code).unwrap(), "Ep", "");
        assert!(matches!(kind(401), ApiError::Unauthenticated));
        assert!(matches!(kind(403), ApiError::Forbidden));
        assert!(matches!(kind(404), ApiError::NotFound(ep) if ep == "Ep"));
        assert!(matches!(kind(429), ApiError::QuotaExceeded));
        assert!(matches!(kind(500), ApiError::Server(500)));
        assert!(matches!(kind(503), ApiError::Server(503)));
        assert!(matches!(kind(418), ApiError::UnexpectedStatus(418, _)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let gw = HttpGateway::new("http://localhost:7071/api/", None).unwrap();
        assert_eq!(gw.base_url, "http://localhost:7071/api");
    }
}
