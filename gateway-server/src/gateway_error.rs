//! Gateway Server's error taxonomy and its mapping onto the unified
//! `{error:{message,code,type,param?}}` HTTP response shape. MCP errors are
//! carried separately as JSON-RPC `{code,message,data?}` objects and never
//! flow through here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::error::{PricingError, ProviderError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("validation error: {message}")]
    Validation { message: String, param: Option<String> },

    #[error("{message}")]
    ModelNotSupported { message: String },

    #[error("authentication required")]
    AuthMissing,

    #[error("invalid credentials")]
    AuthInvalid,

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error("rate limited")]
    RateLimit,

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("billing hook failed: {message}")]
    Billing { message: String },

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

struct Parts {
    status: StatusCode,
    message: String,
    error_type: &'static str,
    code: &'static str,
    param: Option<String>,
}

impl GatewayError {
    fn parts(&self) -> Parts {
        match self {
            GatewayError::Validation { message, param } => Parts {
                status: StatusCode::BAD_REQUEST,
                message: message.clone(),
                error_type: "invalid_request_error",
                code: "invalid_request",
                param: param.clone(),
            },
            GatewayError::ModelNotSupported { message } => Parts {
                status: StatusCode::BAD_REQUEST,
                message: message.clone(),
                error_type: "invalid_request_error",
                code: "model_not_supported",
                param: None,
            },
            GatewayError::AuthMissing => Parts {
                status: StatusCode::UNAUTHORIZED,
                message: "missing or malformed authentication header".to_string(),
                error_type: "authentication_error",
                code: "auth_missing",
                param: None,
            },
            GatewayError::AuthInvalid => Parts {
                status: StatusCode::FORBIDDEN,
                message: "invalid credentials".to_string(),
                error_type: "authentication_error",
                code: "auth_invalid",
                param: None,
            },
            GatewayError::NotFound { message } => Parts {
                status: StatusCode::NOT_FOUND,
                message: message.clone(),
                error_type: "not_found_error",
                code: "not_found",
                param: None,
            },
            GatewayError::Upstream(ProviderError::Upstream { status, message }) => Parts {
                status: StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: message.clone(),
                error_type: "upstream_error",
                code: "upstream_error",
                param: None,
            },
            GatewayError::Upstream(ProviderError::Timeout) => Parts {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: self.to_string(),
                error_type: "upstream_error",
                code: "upstream_timeout",
                param: None,
            },
            GatewayError::Upstream(ProviderError::PathNotAllowed { .. }) => Parts {
                status: StatusCode::NOT_FOUND,
                message: self.to_string(),
                error_type: "not_found_error",
                code: "path_not_allowed",
                param: None,
            },
            GatewayError::Upstream(other) => Parts {
                status: StatusCode::BAD_GATEWAY,
                message: other.to_string(),
                error_type: "upstream_error",
                code: "upstream_error",
                param: None,
            },
            GatewayError::RateLimit => Parts {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: self.to_string(),
                error_type: "rate_limit_error",
                code: "rate_limited",
                param: None,
            },
            GatewayError::Internal { message } => Parts {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: message.clone(),
                error_type: "internal_error",
                code: "internal_error",
                param: None,
            },
            GatewayError::Billing { message } => Parts {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: message.clone(),
                error_type: "internal_error",
                code: "billing_error",
                param: None,
            },
            GatewayError::Pricing(e) => Parts {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: e.to_string(),
                error_type: "internal_error",
                code: "pricing_error",
                param: None,
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let parts = self.parts();
        let mut error = serde_json::Map::new();
        error.insert("message".to_string(), json!(parts.message));
        error.insert("type".to_string(), json!(parts.error_type));
        error.insert("code".to_string(), json!(parts.code));
        if let Some(param) = parts.param {
            error.insert("param".to_string(), json!(param));
        }
        let body = Json(json!({ "error": error }));
        (parts.status, body).into_response()
    }
}
