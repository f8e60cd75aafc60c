//! Normalize arbitrary thumbnails into atlas cells

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum ResizeError {
    #[error("unprocessable image: {0}")]
    Unprocessable(String),
}

/// Decode `data` and cover-fit it into exactly `width`×`height`.
///
/// The source is scaled until its shorter relative side matches the target,
/// then the overflow on the other side is cropped equally from both edges.
pub fn resize_to_cell(data: &[u8], width: u32, height: u32) -> Result<RgbImage, ResizeError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ResizeError::Unprocessable(e.to_string()))?
        .decode()
        .map_err(|e| ResizeError::Unprocessable(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ResizeError::Unprocessable("empty image".to_string()));
    }

    Ok(img.resize_to_fill(width, height, FilterType::Lanczos3).to_rgb8())
}
