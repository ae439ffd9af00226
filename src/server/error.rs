//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::PipelineError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

fn root_cause(err: &PipelineError) -> &PipelineError {
    match err {
        PipelineError::Stage { source, .. } => root_cause(source),
        other => other,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            ServerError::Pipeline(e) if e.is_storage() => {
                tracing::error!(error = %e, "Feature store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to persist features: {}", e))
            }
            ServerError::Pipeline(e) => {
                let status = match root_cause(e) {
                    PipelineError::InvalidInput(_)
                    | PipelineError::MissingColumn(_)
                    | PipelineError::EmptyTable(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                tracing::error!(error = %e, status = status.as_u16(), "Preprocessing failed");
                (status, format!("Preprocessing error: {}", e))
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
