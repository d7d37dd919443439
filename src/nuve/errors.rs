use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeprovisionError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Instance not found: {name}")]
    InstanceNotFound { name: String },
    #[error("Waiting for instance shutdown timed out after {timeout_seconds} seconds.")]
    ShutdownTimeout { timeout_seconds: u64 },
    #[error("Nuve API returned {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Api {
        status: StatusCode,
        message: Option<String>,
        body: String,
    },
    #[error("Network error: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("Invalid response from Nuve API: {0}")]
    InvalidResponse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeprovisionError {
    /// Build an `Api` error from a failed response, pulling `detail.message`
    /// out of the body when the platform sent one.
    pub fn from_response(status: StatusCode, body: String) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/detail/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            });
        DeprovisionError::Api {
            status,
            message,
            body,
        }
    }

    /// Message shown to the CI user: the platform's own explanation when
    /// there is one, otherwise the error text.
    pub fn report_message(&self) -> String {
        match self {
            DeprovisionError::Api {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_message_is_preferred() {
        let err = DeprovisionError::from_response(
            StatusCode::UNAUTHORIZED,
            r#"{"detail":{"message":"Invalid email or password"}}"#.to_string(),
        );
        assert_eq!(err.report_message(), "Invalid email or password");
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_plain_body_falls_back_to_display() {
        let err = DeprovisionError::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "upstream exploded".to_string(),
        );
        match &err {
            DeprovisionError::Api { message, body, .. } => {
                assert!(message.is_none());
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.report_message(), "Nuve API returned 500 Internal Server Error");
    }

    #[test]
    fn test_detail_without_message_falls_back() {
        let err = DeprovisionError::from_response(
            StatusCode::NOT_FOUND,
            r#"{"detail":"gone"}"#.to_string(),
        );
        assert_eq!(err.report_message(), "Nuve API returned 404 Not Found");
    }

    #[test]
    fn test_timeout_message() {
        let err = DeprovisionError::ShutdownTimeout { timeout_seconds: 30 };
        assert_eq!(
            err.report_message(),
            "Waiting for instance shutdown timed out after 30 seconds."
        );
    }
}
