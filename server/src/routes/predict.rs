//! Image upload and prediction endpoint.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use dermascan::DiagnosisReport;
use tracing::{info, warn};

use super::{error_response, ErrorResponse};
use crate::state::SharedState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// POST /predict - classify an uploaded image and return the full
/// diagnosis report.
///
/// Expects a multipart form with a `file` field. The pipeline is
/// compute-bound and synchronous, so it runs on the blocking pool; all
/// per-request state stays inside that closure.
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<DiagnosisReport>, ApiError> {
    let Some(engine) = state.engine.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Model not loaded. Please check server logs.".to_string(),
            }),
        ));
    };

    // Pull the uploaded file out of the multipart form
    let mut upload: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(&format!("failed to read upload: {}", e)))?;
            upload = Some(bytes.to_vec());
            break;
        }
    }

    let bytes = match upload {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(bad_request("No file uploaded")),
    };

    info!(size = bytes.len(), "running diagnosis pipeline");

    let report = tokio::task::spawn_blocking(move || dermascan::diagnose(&engine, &bytes))
        .await
        .map_err(|e| {
            warn!(error = %e, "diagnosis task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error while processing the image".to_string(),
                }),
            )
        })?
        .map_err(|e| {
            warn!(error = %e, "diagnosis failed");
            error_response(&e)
        })?;

    Ok(Json(report))
}
