use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commentbench_bench::BenchError;
use serde_json::json;
use tracing::error;

/// A failed request, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub BenchError);

impl From<BenchError> for ApiError {
    fn from(e: BenchError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            BenchError::UnknownRecord(_) => StatusCode::NOT_FOUND,
            BenchError::InvalidCount { .. } => StatusCode::BAD_REQUEST,
            BenchError::Store(_) | BenchError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
