//! Multipart form parsing helpers
//!
//! Provides reusable abstractions for parsing multipart/form-data uploads,
//! reducing code duplication across handlers.

use std::collections::HashMap;

use axum::extract::Multipart;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Field names accepted for the uploaded image
const IMAGE_FIELDS: &[&str] = &["image", "file"];

/// Represents an image uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed multipart form fields
///
/// Provides structured access to the image and text fields from a multipart/form-data request.
/// Handles validation, type conversion, and JSON parsing.
#[derive(Debug)]
pub struct MultipartFields {
    /// Image field (named "image", or "file")
    file: Option<FileField>,
    /// Text fields indexed by name
    text_fields: HashMap<String, String>,
}

impl MultipartFields {
    /// Parse all fields from a multipart request
    ///
    /// # Arguments
    /// * `multipart` - The Axum multipart extractor
    /// * `max_file_size` - Maximum allowed image size in bytes
    ///
    /// # Returns
    /// Parsed fields or an error if validation fails
    pub async fn parse(multipart: &mut Multipart, max_file_size: usize) -> Result<Self, ApiError> {
        let mut file: Option<FileField> = None;
        let mut text_fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if IMAGE_FIELDS.contains(&name.as_str()) {
                let content_type = field.content_type().map(|s| s.to_string());
                let file_name = field.file_name().map(|s| s.to_string());

                validate_content_type(content_type.as_deref())?;

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read image: {}", e)))?
                    .to_vec();

                validate_file_size(data.len(), max_file_size)?;

                file = Some(FileField {
                    data,
                    content_type,
                    file_name,
                });
            } else {
                // Text field
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                text_fields.insert(name, value);
            }
        }

        Ok(Self { file, text_fields })
    }

    /// Get the image field (required)
    ///
    /// Returns an error if no image was uploaded.
    pub fn require_file(&self) -> Result<&FileField, ApiError> {
        self.file.as_ref().ok_or_else(|| {
            ApiError::bad_request("No image provided. Use 'image' field in multipart form.")
        })
    }

    /// Get a text field value
    ///
    /// Returns `None` if the field is not present.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields.get(name).map(|s| s.as_str())
    }

    /// Get a text field, falling back to `default` when missing or blank
    pub fn get_text_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get_text(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
    }

    /// Get a text field parsed as JSON
    ///
    /// Returns:
    /// - `Ok(Some(T))` if the field exists and is valid JSON
    /// - `Ok(None)` if the field is missing or empty
    /// - `Err(ApiError)` if the field exists but JSON parsing fails
    pub fn get_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text_fields.get(name) {
            Some(json) if !json.is_empty() => {
                let value: T = serde_json::from_str(json)
                    .map_err(|e| ApiError::bad_request(format!("Invalid {} JSON: {}", name, e)))?;
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}
