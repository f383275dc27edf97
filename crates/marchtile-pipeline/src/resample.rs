//! Bicubic downscaling to the working resolution.
//!
//! Only sources strictly larger than the working resolution on both axes
//! are resampled (see [`needs_resample`]). Anything else is processed at
//! its native size, so the pipeline never upscales.
//!
//! Target pixel `(x, y)` maps to source coordinate
//! `(x / (tw - 1) * (sw - 1), y / (th - 1) * (sh - 1))`, so the corner
//! pixels of both rasters line up exactly. The value there is a
//! Catmull-Rom interpolation over the surrounding 4x4 source pixels, with
//! neighbor coordinates clamped to the source edge.

use std::ops::Range;

use crate::raster::{PixelStrip, RasterBuffer};
use crate::types::{Dimensions, PipelineError};

/// Whether a `source`-sized image must be downscaled to `target`.
#[must_use]
pub const fn needs_resample(source: Dimensions, target: Dimensions) -> bool {
    source.exceeds(target)
}

/// Render target rows `rows` of the `target`-sized resampled image.
///
/// The returned strip spans the full target width and is meant to be
/// committed into the normalized buffer with
/// [`RasterBuffer::commit_strip`].
///
/// # Errors
///
/// Returns [`PipelineError::Allocation`] if the strip cannot be allocated.
pub fn resample_rows(
    source: &RasterBuffer,
    target: Dimensions,
    rows: Range<usize>,
) -> Result<PixelStrip, PipelineError> {
    let mut strip = PixelStrip::try_new(target.width as usize, rows.clone())?;
    let source_dims = source.dimensions();

    for (offset, y) in rows.enumerate() {
        let sy = source_coordinate(y, target.height, source_dims.height);
        for x in 0..target.width as usize {
            let sx = source_coordinate(x, target.width, source_dims.width);
            strip.put_pixel(x, offset, sample_bicubic(source, sx, sy));
        }
    }
    Ok(strip)
}

/// Map a target index onto the source axis, corner to corner.
fn source_coordinate(index: usize, target_len: u32, source_len: u32) -> f64 {
    if target_len <= 1 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let u = index as f64 / f64::from(target_len - 1);
    u * f64::from(source_len - 1)
}

/// Interpolate the source at a fractional coordinate.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn sample_bicubic(source: &RasterBuffer, sx: f64, sy: f64) -> [u8; 3] {
    let x0 = sx.floor();
    let y0 = sy.floor();
    let (xi, yi) = (x0 as i64, y0 as i64);

    let mut neighborhood = [[[0u8; 3]; 4]; 4];
    for (m, row) in neighborhood.iter_mut().enumerate() {
        let py = clamp_index(yi + m as i64 - 1, source.height());
        for (n, pixel) in row.iter_mut().enumerate() {
            let px = clamp_index(xi + n as i64 - 1, source.width());
            *pixel = source.pixel(px, py);
        }
    }
    bicubic(&neighborhood, sx - x0, sy - y0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_index(index: i64, len: u32) -> u32 {
    index.clamp(0, i64::from(len) - 1) as u32
}

/// Interpolate a 4x4 neighborhood (`[row][column]`) at fractional offset
/// `(tx, ty)` from its second row and column.
///
/// Catmull-Rom overshoots next to sharp edges, so each channel is clamped
/// to `[0, 255]` before truncation.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bicubic(neighborhood: &[[[u8; 3]; 4]; 4], tx: f64, ty: f64) -> [u8; 3] {
    std::array::from_fn(|channel| {
        let column = neighborhood.map(|row| {
            catmull_rom(
                f64::from(row[0][channel]),
                f64::from(row[1][channel]),
                f64::from(row[2][channel]),
                f64::from(row[3][channel]),
                tx,
            )
        });
        let value = catmull_rom(column[0], column[1], column[2], column[3], ty);
        value.clamp(0.0, 255.0) as u8
    })
}

/// 1D cubic convolution between `p1` and `p2`.
fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let a = 1.5f64.mul_add(p1 - p2, 0.5 * (p3 - p0));
    let b = 2.0f64.mul_add(p2, 2.5f64.mul_add(-p1, p0)) - 0.5 * p3;
    let c = 0.5 * (p2 - p0);
    a.mul_add(t, b).mul_add(t, c).mul_add(t, p1)
}
