use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // Auth errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    // User errors
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailAlreadyRegistered,

    // Signup / OTP errors
    #[error("Pending registration not found")]
    PendingUserNotFound,
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("OTP expired")]
    OtpExpired,
    #[error("Email not verified")]
    OtpNotVerified,

    // Catalog errors
    #[error("Category not found")]
    CategoryNotFound,
    #[error("Product not found")]
    ProductNotFound,
    #[error("Slug already in use: {0}")]
    SlugTaken(String),
    #[error("Size {0} already exists for this product")]
    VariantExists(String),
    #[error("No size {0} stocked for this product")]
    VariantNotFound(String),
    #[error("Unknown size: {0}")]
    UnknownSize(String),

    // Cart errors
    #[error("Cart item not found")]
    CartItemNotFound,
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Only {available} left in stock for {product}")]
    InsufficientStock { product: String, available: i64 },

    // Order errors
    #[error("Order not found")]
    OrderNotFound,
    #[error("Order number already in use: {0}")]
    OrderNumberTaken(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a unique-constraint violation to `conflict`, anything else to
    /// `AppError::Database`.
    pub fn on_unique_violation(err: sqlx::Error, conflict: impl FnOnce() -> AppError) -> AppError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => conflict(),
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // 400 Bad Request
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidOtp
            | AppError::OtpExpired
            | AppError::UnknownSize(_)
            | AppError::EmptyCart
            | AppError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, self.to_string()),

            // 401 Unauthorized
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),

            // 403 Forbidden
            AppError::OtpNotVerified => (StatusCode::FORBIDDEN, self.to_string()),

            // 404 Not Found
            AppError::UserNotFound
            | AppError::PendingUserNotFound
            | AppError::CategoryNotFound
            | AppError::ProductNotFound
            | AppError::VariantNotFound(_)
            | AppError::CartItemNotFound
            | AppError::OrderNotFound => (StatusCode::NOT_FOUND, self.to_string()),

            // 409 Conflict
            AppError::EmailAlreadyRegistered
            | AppError::SlugTaken(_)
            | AppError::VariantExists(_)
            | AppError::OrderNumberTaken(_) => (StatusCode::CONFLICT, self.to_string()),

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
