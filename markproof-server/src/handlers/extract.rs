//! Watermark extraction handler
//!
//! Handles POST /extract requests: decodes the payload from an uploaded image.

use axum::{
    extract::{Multipart, State},
    Json,
};
use markproof_core::Wavelet;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Response for extraction
#[derive(Serialize, ToSchema)]
pub struct ExtractResponse {
    /// Decoded payload bits, one 0/1 value per bit
    #[schema(example = json!([0, 1, 1, 0]))]
    pub decoded_watermark: Vec<u8>,
}

/// Extract a watermark from an image
///
/// Accepts multipart/form-data with:
/// - **image** (required): The image to decode (`file` is accepted as an alias)
/// - **wavelet_type** (optional): `haar` (default), `db1` or `db2`
///
/// Every channel is resampled into the configured square frame before
/// decoding, so any resolution returns the same number of bits.
#[utoipa::path(
    post,
    path = "/extract",
    tag = "Watermark",
    request_body(
        content_type = "multipart/form-data",
        description = "Image to decode and optional wavelet type"
    ),
    responses(
        (status = 200, description = "Decoded watermark", body = ExtractResponse),
        (status = 400, description = "Invalid request (missing or non-image file, unsupported wavelet)"),
        (status = 413, description = "Image too large"),
        (status = 503, description = "Decoder not loaded")
    )
)]
pub async fn extract_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let decoder = state.decoder()?;
    let fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;

    let image_bytes = fields.require_file()?.data.clone();
    let wavelet: Wavelet = fields.get_text_or("wavelet_type", "haar").parse()?;

    let decoded_watermark =
        tokio::task::spawn_blocking(move || decoder.decode_bytes(&image_bytes, wavelet))
            .await
            .map_err(|e| ApiError::internal(format!("Extraction task failed: {}", e)))??;

    tracing::info!(bits = decoded_watermark.len(), %wavelet, "Watermark extracted");

    Ok(Json(ExtractResponse { decoded_watermark }))
}
