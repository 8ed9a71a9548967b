use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced to API clients as `{ "message": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A write rejected by the store (constraint, type or FK failure). The
    /// store's message is passed through as-is.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Read and report failures. Only `message` reaches the client.
    #[error("{message}: {source}")]
    Internal {
        message: String,
        #[source]
        source: BoxError,
    },
}

impl AppError {
    pub fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Internal {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn client_message(&self) -> &str {
        match self {
            AppError::BadRequest(m) | AppError::NotFound(m) => m,
            AppError::Internal { message, .. } => message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal { message, source } = &self {
            tracing::error!(error = %source, "{}", message);
        }
        let body = Json(json!({ "message": self.client_message() }));
        (self.status(), body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Maps a failed write to a 400, keeping the database's own wording when
/// there is one.
pub fn write_error(fallback: &str, e: sqlx::Error) -> AppError {
    tracing::warn!(error = %e, "{}", fallback);
    match e {
        sqlx::Error::Database(db) => AppError::BadRequest(db.message().to_string()),
        other => {
            let text = other.to_string();
            if text.is_empty() {
                AppError::BadRequest(fallback.to_string())
            } else {
                AppError::BadRequest(text)
            }
        }
    }
}

/// Builds the mapper used on read paths: fixed message out, detail logged.
pub fn read_error(message: impl Into<String>) -> impl FnOnce(sqlx::Error) -> AppError {
    let message = message.into();
    move |e| AppError::internal(message, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn internal_errors_hide_the_underlying_cause() {
        let err = AppError::internal("Failed to generate GPA report", sqlx::Error::PoolTimedOut);
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body, json!({ "message": "Failed to generate GPA report" }));
    }

    #[tokio::test]
    async fn not_found_uses_404_and_message_body() {
        let resp = AppError::NotFound("Student not found".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["message"], "Student not found");
    }

    #[test]
    fn non_database_write_failures_become_bad_requests() {
        let err = write_error("Failed to create student", sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn read_error_keeps_the_fixed_message() {
        let err = read_error("Failed to retrieve students")(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Failed to retrieve students");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
