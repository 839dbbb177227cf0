//! Prediction Routes
//!
//! Multipart upload in, `{success, prediction, confidence}` or
//! `{success, error}` out.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prediction_pipeline::Prediction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::AppState;

pub const NO_FILE_UPLOADED: &str = "No file uploaded";
pub const NO_FILE_SELECTED: &str = "No file selected";
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";

/// Response body for the prediction endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            prediction: None,
            confidence: None,
            error: Some(message.into()),
        }
    }

    /// Status and body for a pipeline outcome
    pub fn from_prediction(prediction: Prediction) -> (StatusCode, Self) {
        match prediction {
            Prediction::Success {
                class_name,
                confidence,
            } => (
                StatusCode::OK,
                PredictResponse {
                    success: true,
                    prediction: Some(class_name),
                    confidence: Some(confidence),
                    error: None,
                },
            ),
            Prediction::Failure { error } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                PredictResponse::failure(error),
            ),
        }
    }
}

fn reject(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(PredictResponse::failure(message))).into_response()
}

/// Over the body limit stays 413; any other broken stream is a handler failure
fn multipart_failure(e: MultipartError) -> Response {
    match e.status() {
        StatusCode::PAYLOAD_TOO_LARGE => reject(StatusCode::PAYLOAD_TOO_LARGE, e.body_text()),
        _ => reject(StatusCode::INTERNAL_SERVER_ERROR, e.body_text()),
    }
}

/// Classify the uploaded image
pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("Rejected non-multipart upload: {}", rejection);
            return reject(StatusCode::BAD_REQUEST, NO_FILE_UPLOADED);
        }
    };

    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return multipart_failure(e);
            }
        };

        if field.name() != Some(state.upload_field.as_str()) {
            continue;
        }
        match field.file_name() {
            // a plain form value, not a file
            None => continue,
            Some("") => return reject(StatusCode::BAD_REQUEST, NO_FILE_SELECTED),
            Some(_) => {}
        }

        match field.bytes().await {
            Ok(bytes) => {
                upload = Some(bytes);
                break;
            }
            Err(e) => {
                warn!("Failed to read upload: {}", e);
                return multipart_failure(e);
            }
        }
    }

    let Some(bytes) = upload else {
        return reject(StatusCode::BAD_REQUEST, NO_FILE_UPLOADED);
    };
    debug!("Received upload of {} bytes", bytes.len());

    let pipeline = Arc::clone(&state.pipeline);
    let prediction = match tokio::task::spawn_blocking(move || pipeline.run(&bytes)).await {
        Ok(prediction) => prediction,
        Err(e) => {
            error!("Prediction task failed: {}", e);
            return reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    let (status, body) = PredictResponse::from_prediction(prediction);
    (status, Json(body)).into_response()
}

/// Fallback for methods other than POST
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, OPTIONS")],
        Json(PredictResponse::failure(METHOD_NOT_ALLOWED)),
    )
        .into_response()
}
