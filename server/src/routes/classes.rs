//! Class metadata endpoint.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use dermascan::ClassMetadata;

use super::{error_response, ErrorResponse};

/// GET /class_info/:id - metadata record for a lesion class.
///
/// Indices outside [0, K-1] return 404, never a default record.
pub async fn class_info(
    Path(class_id): Path<usize>,
) -> Result<Json<ClassMetadata>, (StatusCode, Json<ErrorResponse>)> {
    dermascan::class_metadata(class_id)
        .map(|meta| Json(*meta))
        .map_err(|e| error_response(&e))
}
