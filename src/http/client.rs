use crate::nuve::errors::DeprovisionError;
use crate::redact::{mask_json, SecretRegistry};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One outbound call: method, path relative to the base URL, optional JSON
/// body and optional session cookie.
pub struct ApiRequest<'a> {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub cookie: Option<&'a str>,
    /// Keep the body out of the debug log (credentials).
    pub sensitive_body: bool,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            cookie: None,
            sensitive_body: false,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn cookie(mut self, cookie: &'a str) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive_body = true;
        self
    }
}

/// Successful response with its body already read.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DeprovisionError> {
        serde_json::from_str(&self.body).map_err(|e| {
            DeprovisionError::InvalidResponse(format!("{e} (status {})", self.status))
        })
    }
}

/// `reqwest` client bound to a base URL that logs every exchange at debug level.
///
/// Token fields in JSON payloads are masked before logging and registered
/// with the [`SecretRegistry`] so they are scrubbed from any later output.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    secrets: SecretRegistry,
}

impl ApiClient {
    pub fn new(base_url: &str, secrets: SecretRegistry) -> Result<Self, DeprovisionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("nuve-deprovision/", env!("CARGO_PKG_VERSION")))
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secrets,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn secrets(&self) -> &SecretRegistry {
        &self.secrets
    }

    /// Send the request, log both halves, and turn non-2xx statuses into
    /// [`DeprovisionError::Api`].
    pub async fn execute(&self, request: ApiRequest<'_>) -> Result<ApiResponse, DeprovisionError> {
        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, request.path);

        let mut description = format!("{} {}", request.method, url);
        if let Some(body) = &request.body {
            if !request.sensitive_body {
                description.push_str(&format!(", data: {}", mask_json(body)));
            }
        }
        debug!("Starting request {request_id}: {description}");

        let mut builder = self.http.request(request.method.clone(), &url);
        if let Some(cookie) = request.cookie {
            let value = HeaderValue::from_str(cookie).map_err(|_| {
                DeprovisionError::Authentication("session cookie is not a valid header value".into())
            })?;
            builder = builder.header(COOKIE, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            debug!("Request {request_id} failed: {e}");
            DeprovisionError::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        self.log_response(request_id, status, &body);

        if !status.is_success() {
            return Err(DeprovisionError::from_response(status, body));
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn log_response(&self, request_id: Uuid, status: StatusCode, body: &str) {
        let reason = status.canonical_reason().unwrap_or("");
        let mut description = format!("status: {}, status text: {reason}", status.as_u16());

        if !body.is_empty() {
            match serde_json::from_str::<Value>(body) {
                Ok(json) => {
                    if let Some(token) = json.get("token").and_then(Value::as_str) {
                        self.secrets.register(token);
                    }
                    description.push_str(&format!(", data: {}", mask_json(&json)));
                }
                Err(_) => description.push_str(&format!(", data: {body}")),
            }
        }

        debug!("Ending request {request_id}: {description}");
    }
}
