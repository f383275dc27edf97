//! Marching-squares composition: one palette tile per grid cell.
//!
//! Cell `(i, j)` is bounded by sample points `(i, j)`, `(i, j + 1)`,
//! `(i + 1, j + 1)` and `(i + 1, j)`. Their classifications form a 4-bit
//! configuration index, top-left as the high bit:
//!
//! ```text
//! k = 8 * top_left + 4 * top_right + 2 * bottom_right + 1 * bottom_left
//! ```
//!
//! Tile `k` of the palette is copied over the cell's `step x step` pixel
//! square with its top-left corner at pixel `(j * step, i * step)`.
//! Tiles replace the destination pixels outright; there is no blending.

use std::ops::Range;

use crate::grid::ClassificationGrid;
use crate::palette::{CONFIGURATION_COUNT, TilePalette};
use crate::raster::{CHANNELS, PixelStrip};
use crate::types::PipelineError;

/// Configuration index for the four corners of a cell.
#[must_use]
pub const fn configuration_index(
    top_left: u8,
    top_right: u8,
    bottom_right: u8,
    bottom_left: u8,
) -> usize {
    (8 * top_left + 4 * top_right + 2 * bottom_right + bottom_left) as usize
}

/// Configuration index of cell `(i, j)`.
#[must_use]
pub fn cell_configuration(grid: &ClassificationGrid, i: usize, j: usize) -> usize {
    configuration_index(
        grid.get(i, j),
        grid.get(i, j + 1),
        grid.get(i + 1, j + 1),
        grid.get(i + 1, j),
    )
}

/// Stamp the cells of cell rows `rows` into a strip.
///
/// The strip covers pixel rows `[rows.start * step, rows.end * step)` and
/// pixel columns `[0, cols * step)`; pixels right of the last full cell
/// are not part of it and keep their normalized value once the strip is
/// committed.
///
/// The palette's tile size must equal `step` (checked by
/// [`TilePalette::ensure_tile_size`] before any worker starts).
///
/// # Errors
///
/// Returns [`PipelineError::Allocation`] if the strip cannot be allocated.
pub fn stitch_rows(
    grid: &ClassificationGrid,
    palette: &TilePalette,
    step: u32,
    rows: Range<usize>,
) -> Result<PixelStrip, PipelineError> {
    let side = step as usize;
    let cols = grid.shape().cols;
    let pixel_rows = rows.start * side..rows.end * side;
    let mut strip = PixelStrip::try_new(cols * side, pixel_rows)?;
    let tile_stride = side * CHANNELS;

    for (band, i) in rows.enumerate() {
        for j in 0..cols {
            let tile = palette.tile(cell_configuration(grid, i, j));
            let x_start = j * tile_stride;
            for ty in 0..step {
                let dst = strip.row_mut(band * side + ty as usize);
                dst[x_start..x_start + tile_stride].copy_from_slice(tile.row(ty));
            }
        }
    }
    Ok(strip)
}

/// Count how often each configuration index occurs in the grid.
#[must_use]
pub fn configuration_histogram(grid: &ClassificationGrid) -> [usize; CONFIGURATION_COUNT] {
    let shape = grid.shape();
    let mut histogram = [0; CONFIGURATION_COUNT];
    for i in 0..shape.rows {
        for j in 0..shape.cols {
            histogram[cell_configuration(grid, i, j)] += 1;
        }
    }
    histogram
}
