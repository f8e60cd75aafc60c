//! Grid geometry of the atlas canvas

use crate::constants::{ATLAS_SIZE, THUMB_HEIGHT, THUMB_WIDTH};

/// A square canvas cut into equal cells, scanned row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    pub canvas_size: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl Default for AtlasLayout {
    fn default() -> Self {
        Self::new(ATLAS_SIZE, THUMB_WIDTH, THUMB_HEIGHT)
    }
}

impl AtlasLayout {
    pub const fn new(canvas_size: u32, cell_width: u32, cell_height: u32) -> Self {
        Self {
            canvas_size,
            cell_width,
            cell_height,
        }
    }

    pub fn cells_per_row(&self) -> u32 {
        self.canvas_size / self.cell_width
    }

    pub fn rows(&self) -> u32 {
        self.canvas_size / self.cell_height
    }

    /// Number of cells that fit on the canvas
    pub fn capacity(&self) -> usize {
        self.cells_per_row() as usize * self.rows() as usize
    }

    /// Top-left pixel of cell `slot`, or `None` past capacity
    pub fn cell_origin(&self, slot: usize) -> Option<(u32, u32)> {
        if slot >= self.capacity() {
            return None;
        }
        let per_row = self.cells_per_row() as usize;
        let row = (slot / per_row) as u32;
        let col = (slot % per_row) as u32;
        Some((col * self.cell_width, row * self.cell_height))
    }
}
