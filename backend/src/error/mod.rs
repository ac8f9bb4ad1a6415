use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// SQLSTATE classes for data exceptions (22) and integrity violations (23).
const DATA_EXCEPTION_CLASS: &str = "22";
const INTEGRITY_VIOLATION_CLASS: &str = "23";

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<Value>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    InternalServerError(anyhow::Error),
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl AppError {
    /// True for failures caused by the data a caller submitted, as opposed to
    /// the database being unreachable or misbehaving.
    pub fn is_rejected_input(&self) -> bool {
        matches!(self, AppError::BadRequest(_) | AppError::Validation(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let sqlstate = match &err {
            sqlx::Error::RowNotFound => {
                return AppError::NotFound("Resource not found".to_string())
            }
            sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
            _ => None,
        };

        match sqlstate.as_deref() {
            Some(code)
                if code.starts_with(INTEGRITY_VIOLATION_CLASS)
                    || code.starts_with(DATA_EXCEPTION_CLASS) =>
            {
                AppError::BadRequest(constraint_message(&err))
            }
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

fn constraint_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => match db_err.constraint() {
            Some(constraint) => format!("Constraint violated: {}", constraint),
            None => db_err.message().to_string(),
        },
        other => other.to_string(),
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
