//! Consistent JSON error responses.
//!
//! Failures surface as `{ "error": ..., "success": false }` with a non-2xx
//! status; internal stack traces never leave the process.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use airsense_core::PipelineError;

pub fn pipeline_error_to_response(err: &PipelineError) -> axum::response::Response {
    let status = match err {
        PipelineError::Network(_) | PipelineError::Parse(_) => StatusCode::BAD_GATEWAY,
        PipelineError::MissingFeature(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::UnknownFeature(_) | PipelineError::Model(_) | PipelineError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, err.to_string())
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": message.into(),
            "success": false,
        })),
    )
        .into_response()
}
