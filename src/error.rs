use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid email/phone or password")]
    InvalidCredentials,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("An account with this email or phone already exists")]
    UserExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or already used OTP")]
    OtpInvalid,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Order can no longer be cancelled")]
    OrderCannotCancel,

    #[error("Invalid order status transition")]
    InvalidTransition,

    #[error("Insufficient stock for requested medicine")]
    InsufficientStock { medicine_id: Uuid, requested: i32 },

    #[error("Inventory is locked by another operation, retry shortly")]
    InventoryLocked,

    #[error("Idempotency key was already used with a different request")]
    IdempotencyConflict,

    #[error("Inventory item not found")]
    InventoryNotFound,

    #[error("A batch with this number already exists for the medicine")]
    BatchExists,

    #[error("Delivery not found")]
    DeliveryNotFound,

    #[error("Invalid delivery OTP")]
    DeliveryOtpInvalid,

    #[error("Delivery is no longer available")]
    DriverNotAvailable,

    #[error("Database error")]
    Db(#[from] sqlx::Error),

    #[error("Key-value store error")]
    Kv(#[from] redis::RedisError),

    #[error("Event bus error")]
    Bus(#[from] lapin::Error),

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::UserExists => "USER_EXISTS",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::OtpInvalid => "OTP_INVALID",
            AppError::OtpExpired => "OTP_EXPIRED",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::MissingField(_) => "MISSING_FIELD",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::OrderNotFound => "ORDER_NOT_FOUND",
            AppError::OrderCannotCancel => "ORDER_CANNOT_CANCEL",
            AppError::InvalidTransition => "INVALID_TRANSITION",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::InventoryLocked => "INVENTORY_LOCKED",
            AppError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            AppError::InventoryNotFound => "INVENTORY_NOT_FOUND",
            AppError::BatchExists => "BATCH_EXISTS",
            AppError::DeliveryNotFound => "DELIVERY_NOT_FOUND",
            AppError::DeliveryOtpInvalid => "DELIVERY_OTP_INVALID",
            AppError::DriverNotAvailable => "DRIVER_NOT_AVAILABLE",
            AppError::Db(_) => "DATABASE_ERROR",
            AppError::Kv(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Bus(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::TokenInvalid
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserExists | AppError::BatchExists | AppError::IdempotencyConflict => {
                StatusCode::CONFLICT
            }
            AppError::UserNotFound
            | AppError::NotFound(_)
            | AppError::OrderNotFound
            | AppError::InventoryNotFound
            | AppError::DeliveryNotFound => StatusCode::NOT_FOUND,
            AppError::OtpInvalid
            | AppError::OtpExpired
            | AppError::Validation(_)
            | AppError::BadRequest(_)
            | AppError::MissingField(_)
            | AppError::OrderCannotCancel
            | AppError::InvalidTransition
            | AppError::DeliveryOtpInvalid => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InsufficientStock { .. } | AppError::DriverNotAvailable => {
                StatusCode::CONFLICT
            }
            AppError::InventoryLocked => StatusCode::LOCKED,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Kv(_) | AppError::Bus(_) | AppError::ServiceUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InsufficientStock {
                medicine_id,
                requested,
            } => Some(serde_json::json!({
                "medicine_id": medicine_id,
                "requested_qty": requested,
            })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error_code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Db(err) => tracing::error!(error = %err, "database error"),
            AppError::Kv(err) => tracing::error!(error = %err, "key-value store error"),
            AppError::Bus(err) => tracing::error!(error = %err, "event bus error"),
            AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
            _ => {}
        }

        let body = ErrorBody {
            success: false,
            error_code: self.error_code(),
            message: self.to_string(),
            details: self.details(),
        };

        (self.status_code(), axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
