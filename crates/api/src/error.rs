use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use skillforge_core::error::CoreError;
use skillforge_db::DbError;

/// PostgreSQL SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Error returned by every handler and extractor.
///
/// Rendered as `{"error": <message>, "code": <CODE>}` with the matching
/// status. Internal failures are logged and reach the client only as a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => AppError::Database(e),
            DbError::Core(e) => AppError::Core(e),
        }
    }
}

type Rendered = (StatusCode, &'static str, String);

impl AppError {
    fn render(&self) -> Rendered {
        match self {
            AppError::Core(core) => render_core(core),
            AppError::Database(err) => render_sqlx(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.render();
        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

fn render_core(err: &CoreError) -> Rendered {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

/// `RowNotFound` is a 404 and a unique violation on a `uq_*` constraint a
/// 409. Anything else is a sanitised 500.
fn render_sqlx(err: &sqlx::Error) -> Rendered {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
                && db_err.constraint().is_some_and(|c| c.starts_with("uq_")) =>
        {
            let constraint = db_err.constraint().unwrap_or_default();
            (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("Duplicate value violates unique constraint: {constraint}"),
            )
        }
        other => internal(other),
    }
}

fn internal(detail: &dyn std::fmt::Display) -> Rendered {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
