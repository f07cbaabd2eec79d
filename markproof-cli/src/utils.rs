//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use markproof_core::load_rgb;
use tracing::debug;

/// Read and decode an image file into RGB.
pub fn read_image(path: &Path) -> Result<RgbImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read image");

    let image = load_rgb(&bytes).with_context(|| format!("Cannot decode {}", path.display()))?;
    Ok(image)
}

/// Parse a payload given either as a 0/1 string or as a JSON array.
///
/// Whitespace, `_` and `,` are ignored in the string form so long payloads
/// can be grouped (`0110_1001`).
pub fn parse_bits(input: &str) -> Result<Vec<u8>> {
    let input = input.trim();

    if input.starts_with('[') {
        let bits: Vec<u8> = serde_json::from_str(input)
            .with_context(|| "Invalid payload: expected a JSON array of 0/1 values")?;
        return Ok(bits);
    }

    let mut bits = Vec::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '0' => bits.push(0),
            '1' => bits.push(1),
            c if c.is_whitespace() || c == '_' || c == ',' => {}
            other => bail!("Invalid payload: unexpected character '{}'", other),
        }
    }

    if bits.is_empty() {
        bail!("Invalid payload: no bits given");
    }
    Ok(bits)
}

/// Build the default output path for a watermarked image.
///
/// Transforms `dir/photo.jpg` into `dir/photo.watermarked.png`.
pub fn build_output_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    image.with_file_name(format!("{}.watermarked.png", stem))
}

/// Render bits as a compact 0/1 string.
pub fn format_bits(bits: &[u8]) -> String {
    bits.iter().map(|b| if *b == 0 { '0' } else { '1' }).collect()
}

/// Count positions where two payloads differ.
pub fn bit_errors(decoded: &[u8], expected: &[u8]) -> usize {
    decoded.iter().zip(expected).filter(|(a, b)| a != b).count()
}
