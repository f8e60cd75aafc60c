//! Paste normalized cells onto the atlas canvas and encode it

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage, imageops};
use std::io::Cursor;

use super::layout::AtlasLayout;
use crate::error::AtlasError;

/// Place `cells[i]` at slot `i`. Unused slots keep `background`.
pub fn compose(
    cells: &[RgbImage],
    layout: &AtlasLayout,
    background: Rgb<u8>,
) -> Result<RgbImage, AtlasError> {
    let capacity = layout.capacity();
    if cells.len() > capacity {
        return Err(AtlasError::OverCapacity {
            cells: cells.len(),
            capacity,
        });
    }

    let mut canvas = RgbImage::from_pixel(layout.canvas_size, layout.canvas_size, background);

    for (slot, cell) in cells.iter().enumerate() {
        let Some((x, y)) = layout.cell_origin(slot) else {
            break;
        };
        if cell.dimensions() == (layout.cell_width, layout.cell_height) {
            imageops::replace(&mut canvas, cell, x as i64, y as i64);
        } else {
            // never bleed into a neighbour
            let clipped =
                imageops::crop_imm(cell, 0, 0, layout.cell_width, layout.cell_height).to_image();
            imageops::replace(&mut canvas, &clipped, x as i64, y as i64);
        }
    }

    Ok(canvas)
}

pub fn encode_jpeg(canvas: &RgbImage, quality: u8) -> Result<Vec<u8>, AtlasError> {
    let mut out = Cursor::new(Vec::new());
    canvas.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out.into_inner())
}
