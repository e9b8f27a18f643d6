use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Backend request failed: {0}")]
    BackendError(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Tool '{name}' failed: {message}")]
    ToolError { name: String, message: String },

    #[error("Failed to execute tool call after {attempts} attempts: {last_error}")]
    ToolRetriesExhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Request,
    Tool,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RelayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::BackendError(_) | RelayError::BackendStatus { .. } => ErrorCategory::Network,
            RelayError::ConfigError { .. }
            | RelayError::ConfigValidationError { .. }
            | RelayError::InvalidConfigValueError { .. }
            | RelayError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RelayError::InvalidRequest { .. } | RelayError::SerializationError(_) => {
                ErrorCategory::Request
            }
            RelayError::UnknownTool { .. }
            | RelayError::ToolError { .. }
            | RelayError::ToolRetriesExhausted { .. } => ErrorCategory::Tool,
            RelayError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Tool => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RelayError::BackendError(e) if e.is_connect() => {
                "Make sure the inference server is running (ollama serve) and the backend URL is correct"
            }
            RelayError::BackendError(e) if e.is_timeout() => {
                "The inference server took too long to answer; raise backend.timeout_seconds or use a smaller model"
            }
            RelayError::BackendError(_) | RelayError::BackendStatus { .. } => {
                "Check the inference server logs and verify the requested model is pulled"
            }
            RelayError::IoError(_) => "Check that the port is free and the process has the required permissions",
            RelayError::SerializationError(_) | RelayError::InvalidRequest { .. } => {
                "Send a valid JSON object as the request body"
            }
            RelayError::ConfigError { .. }
            | RelayError::ConfigValidationError { .. }
            | RelayError::InvalidConfigValueError { .. }
            | RelayError::MissingConfigError { .. } => {
                "Review the configuration file and command line flags"
            }
            RelayError::UnknownTool { .. } => "The model asked for a tool that is not registered; try another model",
            RelayError::ToolError { .. } | RelayError::ToolRetriesExhausted { .. } => {
                "Verify BALLDONTLIE_API_KEY and network access to the sports data API"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the inference server: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Request => format!("Bad request: {}", self),
            ErrorCategory::Tool => format!("Tool calling failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest { .. } | RelayError::SerializationError(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::BackendStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            RelayError::BackendError(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            RelayError::BackendError(_)
            | RelayError::UnknownTool { .. }
            | RelayError::ToolError { .. }
            | RelayError::ToolRetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::ToolError {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        RelayError::InvalidRequest {
            message: message.into(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::warn!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            self,
            self.category(),
            self.severity()
        );
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
