//! HTTP route handlers.

pub mod classes;
pub mod health;
pub mod predict;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Client-facing error payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a core pipeline error to an HTTP response.
///
/// Client mistakes (bad bytes, unsupported formats, unknown class ids)
/// come back as 4xx; everything else is a server-side failure.
pub fn error_response(err: &dermascan::Error) -> (StatusCode, Json<ErrorResponse>) {
    use dermascan::Error;

    let status = match err {
        Error::Decode(_) | Error::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
        Error::ClassIndex(_) => StatusCode::NOT_FOUND,
        Error::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Inference(_)
        | Error::Explanation(_)
        | Error::Config(_)
        | Error::Io(_)
        | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_400() {
        let (status, _) = error_response(&dermascan::Error::Decode("bad bytes".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(&dermascan::Error::UnsupportedFormat("gif".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_class_maps_to_404() {
        let (status, _) = error_response(&dermascan::Error::ClassIndex(7));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pipeline_failures_map_to_500() {
        let (status, _) = error_response(&dermascan::Error::Inference("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = error_response(&dermascan::Error::Explanation("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
