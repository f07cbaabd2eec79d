//! Watermark embedding handler
//!
//! Handles POST /embed requests: hides a bit payload in an uploaded image
//! and returns the watermarked image as PNG.

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use markproof_core::{encode_png, load_rgb, Wavelet};

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::validation::parse_watermark_length;

/// File name suggested for the returned image
pub const WATERMARKED_FILE_NAME: &str = "watermarked_image.png";

/// Embed a watermark into an image
///
/// Accepts multipart/form-data with:
/// - **image** (required): The cover image (`file` is accepted as an alias)
/// - **watermark_length** (required): Declared number of bits
/// - **watermark_bits** (required): JSON array of 0/1 values, e.g. `[0,1,1,0]`
/// - **wavelet_type** (optional): `haar` (default), `db1` or `db2`
///
/// Returns the watermarked image as a PNG attachment.
#[utoipa::path(
    post,
    path = "/embed",
    tag = "Watermark",
    request_body(
        content_type = "multipart/form-data",
        description = "Image, payload length, payload bits and wavelet type"
    ),
    responses(
        (status = 200, description = "Watermarked image (image/png attachment)"),
        (status = 400, description = "Invalid request (missing image, malformed bits, unsupported wavelet)"),
        (status = 413, description = "Image too large"),
        (status = 422, description = "Image too small for the payload"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn embed_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let fields = MultipartFields::parse(&mut multipart, state.max_file_size).await?;

    let image_bytes = fields.require_file()?.data.clone();
    let bit_length = parse_watermark_length(fields.get_text("watermark_length"))?;
    let bits: Vec<u8> = fields
        .get_json("watermark_bits")?
        .ok_or_else(|| ApiError::bad_request("Missing 'watermark_bits' field."))?;
    let wavelet: Wavelet = fields.get_text_or("wavelet_type", "haar").parse()?;

    let embedder = state.embedder;
    let png = tokio::task::spawn_blocking(move || {
        let image = load_rgb(&image_bytes)?;
        let marked = embedder.embed(&image, bit_length, &bits, wavelet)?;
        encode_png(&marked)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Embedding task failed: {}", e)))??;

    tracing::info!(bits = bit_length, %wavelet, bytes = png.len(), "Watermark embedded");

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", WATERMARKED_FILE_NAME),
            ),
        ],
        png,
    )
        .into_response())
}
