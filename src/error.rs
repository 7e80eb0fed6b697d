use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("Invalid amount.")]
    InvalidAmount,

    #[error("{message}")]
    GatewayError {
        message: String,
        decline_code: Option<String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Your network or VPN may be blocking the secure connection.")]
    NetworkBlocked,

    #[error("Unable to generate automated analysis at this time.")]
    AIAssistantUnavailable,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Please use Safari (iOS) or Chrome (Android) for contactless payment.")]
    WalletUnsupported,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn gateway(message: impl Into<String>) -> Self {
        AppError::GatewayError {
            message: message.into(),
            decline_code: None,
        }
    }

    pub fn declined(message: impl Into<String>, decline_code: Option<String>) -> Self {
        AppError::GatewayError {
            message: message.into(),
            decline_code,
        }
    }

    pub fn decline_code(&self) -> Option<&str> {
        match self {
            AppError::GatewayError { decline_code, .. } => decline_code.as_deref(),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidAmount => "invalid_amount",
            AppError::GatewayError { .. } => "gateway_error",
            AppError::NotFound(_) => "not_found",
            AppError::NetworkBlocked => "network_blocked",
            AppError::AIAssistantUnavailable => "ai_assistant_unavailable",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::WalletUnsupported => "wallet_unsupported",
            AppError::Config(_) => "config_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidAmount | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::GatewayError { .. } => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NetworkBlocked | AppError::AIAssistantUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::WalletUnsupported => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::warn!("request rejected: {self}");
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            decline_code: self.decline_code().map(str::to_string),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
