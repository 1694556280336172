#![allow(dead_code)]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Policy violation: {0}")]
    Policy(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ArborError {
    /// Remaps a unique-constraint violation to a policy error (duplicate
    /// signup, duplicate vendor assignment). Other errors pass through.
    pub fn policy_on_unique(self, msg: &str) -> Self {
        let unique_violation = matches!(
            &self,
            ArborError::Database(sqlx::Error::Database(db))
                if db.code().as_deref() == Some("23505")
        );
        if unique_violation {
            ArborError::Policy(msg.to_string())
        } else {
            self
        }
    }
}

impl Serialize for ArborError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type ArborResult<T> = Result<T, ArborError>;

impl IntoResponse for ArborError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ArborError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A server error occurred.".to_string(),
                )
            }
            ArborError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            ArborError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ArborError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ArborError::Policy(msg) => (StatusCode::BAD_REQUEST, msg),
            ArborError::Internal(msg) => {
                tracing::error!("Internal Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A server error occurred.".to_string(),
                )
            }
            _ => {
                tracing::error!("Unhandled Error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
