//! Binary classification grid sampled from the normalized raster.
//!
//! Sample point `(i, j)` sits at pixel column `j * step`, row `i * step`.
//! A raster of `width x height` yields `rows = height / step` cell rows
//! and `cols = width / step` cell columns, and therefore
//! `(rows + 1) x (cols + 1)` sample points: every cell needs its
//! bottom-right neighbor.
//!
//! The extra column and row usually fall outside the raster, so they are
//! sampled from the last pixel column and last pixel row instead. The
//! bottom-right sample point is always 0.

use std::ops::Range;

use crate::raster::RasterBuffer;
use crate::types::{Dimensions, PipelineError};

/// Cell counts of a classification grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Number of cell rows (`height / step`).
    pub rows: usize,
    /// Number of cell columns (`width / step`).
    pub cols: usize,
}

impl GridShape {
    /// Grid shape for a raster sampled every `step` pixels.
    #[must_use]
    pub const fn for_raster(dims: Dimensions, step: u32) -> Self {
        Self {
            rows: (dims.height / step) as usize,
            cols: (dims.width / step) as usize,
        }
    }

    /// Number of sample-point rows (`rows + 1`).
    #[must_use]
    pub const fn point_rows(self) -> usize {
        self.rows + 1
    }

    /// Number of sample-point columns (`cols + 1`).
    #[must_use]
    pub const fn point_cols(self) -> usize {
        self.cols + 1
    }
}

/// Sample points of a raster, each 1 (dark) or 0 (bright).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationGrid {
    shape: GridShape,
    points: Vec<u8>,
}

impl ClassificationGrid {
    /// Allocate an all-zero grid.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if the point array cannot be
    /// allocated.
    pub fn try_new(shape: GridShape) -> Result<Self, PipelineError> {
        let points = allocate_points(shape, shape.point_rows())?;
        Ok(Self { shape, points })
    }

    /// Build a grid from row-major sample points.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if the point count does
    /// not match `shape` or a point is neither 0 nor 1.
    pub fn from_points(shape: GridShape, points: Vec<u8>) -> Result<Self, PipelineError> {
        let expected = shape.point_rows() * shape.point_cols();
        if points.len() != expected {
            return Err(PipelineError::Configuration(format!(
                "grid of {}x{} cells needs {expected} points, got {}",
                shape.rows,
                shape.cols,
                points.len(),
            )));
        }
        if points.iter().any(|&p| p > 1) {
            return Err(PipelineError::Configuration(
                "grid points must be 0 or 1".to_owned(),
            ));
        }
        Ok(Self { shape, points })
    }

    /// Cell counts.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Sample point at point row `i`, point column `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> u8 {
        debug_assert!(i < self.shape.point_rows() && j < self.shape.point_cols());
        self.points[i * self.shape.point_cols() + j]
    }

    /// All sample points, row-major.
    #[must_use]
    pub fn points(&self) -> &[u8] {
        &self.points
    }

    /// Number of sample points classified as dark.
    #[must_use]
    pub fn dark_points(&self) -> usize {
        self.points.iter().filter(|&&p| p == 1).count()
    }

    /// Copy whole point rows produced by [`sample_rows`] into the grid,
    /// starting at point row `first_row`.
    ///
    /// # Panics
    ///
    /// Panics if the rows do not fit inside the grid.
    pub fn commit_rows(&mut self, first_row: usize, rows: &[u8]) {
        let cols = self.shape.point_cols();
        debug_assert_eq!(rows.len() % cols, 0, "partial grid row");
        let start = first_row * cols;
        self.points[start..start + rows.len()].copy_from_slice(rows);
    }
}

/// Average of the three channels, truncated.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn luma(pixel: [u8; 3]) -> u8 {
    let [r, g, b] = pixel.map(u16::from);
    ((r + g + b) / 3) as u8
}

/// Classify a pixel: 1 if its luma is at or below `threshold`.
#[must_use]
pub fn classify(pixel: [u8; 3], threshold: u8) -> u8 {
    u8::from(luma(pixel) <= threshold)
}

/// Sample the point rows `rows` of a grid over `normalized`.
///
/// `rows` indexes point rows in `[0, shape.rows + 1)`. The result holds
/// `rows.len() * (shape.cols + 1)` points ready for
/// [`ClassificationGrid::commit_rows`].
///
/// # Errors
///
/// Returns [`PipelineError::Allocation`] if the row buffer cannot be
/// allocated.
#[allow(clippy::cast_possible_truncation)]
pub fn sample_rows(
    normalized: &RasterBuffer,
    shape: GridShape,
    step: u32,
    threshold: u8,
    rows: Range<usize>,
) -> Result<Vec<u8>, PipelineError> {
    let mut out = allocate_points(shape, rows.len())?;
    let last_x = normalized.width() - 1;
    let last_y = normalized.height() - 1;
    let cols = shape.cols;

    for (row, i) in out.chunks_exact_mut(shape.point_cols()).zip(rows) {
        if i == shape.rows {
            // Bottom boundary row: last pixel row, corner fixed at 0.
            for (j, point) in row[..cols].iter_mut().enumerate() {
                *point = classify(normalized.pixel(j as u32 * step, last_y), threshold);
            }
            row[cols] = 0;
        } else {
            let y = i as u32 * step;
            for (j, point) in row[..cols].iter_mut().enumerate() {
                *point = classify(normalized.pixel(j as u32 * step, y), threshold);
            }
            // Right boundary column: last pixel column.
            row[cols] = classify(normalized.pixel(last_x, y), threshold);
        }
    }
    Ok(out)
}

fn allocate_points(shape: GridShape, point_rows: usize) -> Result<Vec<u8>, PipelineError> {
    let error = || PipelineError::Allocation {
        width: shape.point_cols() as u64,
        height: point_rows as u64,
    };
    let len = point_rows
        .checked_mul(shape.point_cols())
        .ok_or_else(error)?;
    let mut points = Vec::new();
    points.try_reserve_exact(len).map_err(|_| error())?;
    points.resize(len, 0);
    Ok(points)
}
