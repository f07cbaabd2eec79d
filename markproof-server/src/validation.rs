//! Upload validation module
//!
//! Provides validation utilities for multipart image uploads.

use crate::error::ApiError;

/// Validates the Content-Type of an uploaded image
///
/// Accepts any `image/*` type. A missing Content-Type is allowed; the bytes
/// still have to decode as an image later.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(ct) if ct.to_lowercase().starts_with("image/") => Ok(()),
        Some(ct) => Err(ApiError::bad_request(format!(
            "File provided is not an image (Content-Type: '{}')",
            ct
        ))),
        None => Ok(()),
    }
}

/// Validates the size of an uploaded file
///
/// Returns an error if the file exceeds the maximum size.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size > max_size {
        let max_mb = max_size / (1024 * 1024);
        let actual_mb = size / (1024 * 1024);
        Err(ApiError::PayloadTooLarge(format!(
            "File too large: {} MB exceeds maximum of {} MB",
            actual_mb, max_mb
        )))
    } else {
        Ok(())
    }
}

/// Parse the declared payload length field.
pub fn parse_watermark_length(value: Option<&str>) -> Result<usize, ApiError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing 'watermark_length' field."))?;
    value.parse().map_err(|_| {
        ApiError::bad_request(format!(
            "watermark_length must be a non-negative integer, got '{}'",
            value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type_image() {
        assert!(validate_content_type(Some("image/jpeg")).is_ok());
        assert!(validate_content_type(Some("image/png")).is_ok());
        assert!(validate_content_type(Some("IMAGE/WEBP")).is_ok()); // case insensitive
        assert!(validate_content_type(None).is_ok());
    }

    #[test]
    fn test_validate_content_type_rejected() {
        assert!(validate_content_type(Some("text/plain")).is_err());
        assert!(validate_content_type(Some("application/json")).is_err());
        assert!(validate_content_type(Some("video/mp4")).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        let max = 10 * 1024 * 1024; // 10 MB
        assert!(validate_file_size(1024, max).is_ok());
        assert!(validate_file_size(max, max).is_ok()); // exactly max
        assert!(matches!(
            validate_file_size(max + 1, max),
            Err(ApiError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_parse_watermark_length() {
        assert_eq!(parse_watermark_length(Some("128")).unwrap(), 128);
        assert_eq!(parse_watermark_length(Some(" 64 ")).unwrap(), 64);
        assert!(parse_watermark_length(None).is_err());
        assert!(parse_watermark_length(Some("")).is_err());
        assert!(parse_watermark_length(Some("-3")).is_err());
        assert!(parse_watermark_length(Some("many")).is_err());
    }
}
