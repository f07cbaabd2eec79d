//! Image container boundary: bytes in, RGB8 grids out, PNG back.

use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::error::{Result, WatermarkError};

/// Decode image bytes into an RGB8 grid.
///
/// Supports JPEG, PNG, GIF and WebP. Alpha and palette data are flattened
/// to RGB; grayscale is expanded to three equal channels.
pub fn load_rgb(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(WatermarkError::InvalidImage("image data is empty".into()));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| WatermarkError::InvalidImage(format!("failed to decode image: {}", e)))?;
    Ok(image.to_rgb8())
}

/// Encode an RGB8 grid as PNG.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| WatermarkError::Processing(format!("failed to encode PNG: {}", e)))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_png_round_trip() {
        let image = RgbImage::from_fn(17, 9, |x, y| Rgb([x as u8, y as u8, 200]));
        let png = encode_png(&image).unwrap();
        assert_eq!(load_rgb(&png).unwrap(), image);
    }

    #[test]
    fn test_load_rejects_garbage() {
        assert!(matches!(
            load_rgb(b"definitely not an image"),
            Err(WatermarkError::InvalidImage(_))
        ));
        assert!(matches!(load_rgb(&[]), Err(WatermarkError::InvalidImage(_))));
    }

    #[test]
    fn test_load_flattens_grayscale() {
        let gray = image::GrayImage::from_pixel(4, 4, image::Luma([90]));
        let mut buffer = Cursor::new(Vec::new());
        gray.write_to(&mut buffer, ImageFormat::Png).unwrap();
        let rgb = load_rgb(buffer.get_ref()).unwrap();
        assert_eq!(rgb.get_pixel(2, 2), &Rgb([90, 90, 90]));
    }
}
