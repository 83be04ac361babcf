use serde::Serialize;

use crate::gateway::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppErrorCode {
    Auth,
    Write,
    Network,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(code: AppErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            trace_id: Some(crate::observability::trace_id().to_string()),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Auth, message)
    }

    pub fn write(message: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Write, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Network, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Internal, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<GatewayError> for AppError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Unavailable => AppError::network("Backend unavailable")
                .with_details(GatewayError::Unavailable.to_string()),
            GatewayError::Rejected(reason) => AppError::write("Write rejected").with_details(reason),
            GatewayError::Decode(err) => {
                AppError::internal("Malformed document").with_details(err.to_string())
            }
            other if other.is_auth() => AppError::auth(other.to_string()),
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal("Invalid JSON payload").with_details(value.to_string())
    }
}
