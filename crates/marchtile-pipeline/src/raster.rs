//! RGB raster buffers and the row strips workers produce.
//!
//! [`RasterBuffer`] wraps an `image::RgbImage` with fallible allocation
//! and row-slice access. Pixel `(x, y)` is column `x`, row `y`, stored
//! row-major.
//!
//! Workers never write into a shared buffer pixel by pixel. Each one
//! renders its partition into a [`PixelStrip`] and commits the strip in a
//! single copy via [`RasterBuffer::commit_strip`].

use std::ops::Range;

use image::{Rgb, RgbImage};

use crate::types::{Dimensions, PipelineError};

/// Bytes per RGB pixel.
pub const CHANNELS: usize = 3;

/// An owned, fixed-size RGB raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer(RgbImage);

impl RasterBuffer {
    /// Allocate a black raster of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if either dimension is zero,
    /// the byte count overflows `usize`, or the allocator refuses the
    /// request.
    pub fn try_new(width: u32, height: u32) -> Result<Self, PipelineError> {
        let data = allocate_zeroed(width, height)?;
        RgbImage::from_raw(width, height, data)
            .map(Self)
            .ok_or_else(|| allocation_error(width, height))
    }

    /// Allocate a raster filled with a single color.
    ///
    /// # Errors
    ///
    /// Same as [`try_new`](Self::try_new).
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Result<Self, PipelineError> {
        let mut buffer = Self::try_new(width, height)?;
        for pixel in buffer.0.pixels_mut() {
            *pixel = Rgb(color);
        }
        Ok(buffer)
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel.
    ///
    /// Intended for small synthetic images (tiles, test fixtures); the
    /// allocation is infallible like `RgbImage::from_fn`.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 3]) -> Self {
        Self(RgbImage::from_fn(width, height, |x, y| Rgb(f(x, y))))
    }

    /// Wrap an already decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] for a zero-sized image, which
    /// no pipeline stage can process.
    pub fn from_image(image: RgbImage) -> Result<Self, PipelineError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(allocation_error(image.width(), image.height()));
        }
        Ok(Self(image))
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Width and height as [`Dimensions`].
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Read the pixel at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        debug_assert!(
            x < self.width() && y < self.height(),
            "pixel ({x}, {y}) outside {}x{} raster",
            self.width(),
            self.height(),
        );
        self.0.get_pixel(x, y).0
    }

    /// Overwrite the pixel at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.0.put_pixel(x, y, Rgb(color));
    }

    /// Raw bytes of row `y` (`width * 3` bytes).
    #[must_use]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.0.as_raw()[start..start + stride]
    }

    /// Copy a strip into this raster.
    ///
    /// The strip covers columns `[0, strip.width)` of rows
    /// `strip.rows()`; pixels to the right of the strip are left as they
    /// are.
    ///
    /// # Panics
    ///
    /// Panics if the strip does not fit inside the raster.
    pub fn commit_strip(&mut self, strip: &PixelStrip) {
        let stride = self.stride();
        let strip_stride = strip.stride();
        debug_assert!(strip_stride <= stride, "strip wider than raster");
        let rows = strip.rows();
        let dst = &mut *self.0;
        for (offset, y) in rows.enumerate() {
            let dst_start = y * stride;
            dst[dst_start..dst_start + strip_stride].copy_from_slice(strip.row(offset));
        }
    }

    /// Borrow the underlying image.
    #[must_use]
    pub const fn as_image(&self) -> &RgbImage {
        &self.0
    }

    fn stride(&self) -> usize {
        self.width() as usize * CHANNELS
    }
}

/// A band of rendered rows owned by one worker.
///
/// Covers pixel rows `[first_row, first_row + height)` and pixel columns
/// `[0, width)` of some destination raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelStrip {
    width: usize,
    first_row: usize,
    data: Vec<u8>,
}

impl PixelStrip {
    /// Allocate a black strip covering `rows`, `width` pixels wide.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Allocation`] if the strip cannot be
    /// allocated.
    pub fn try_new(width: usize, rows: Range<usize>) -> Result<Self, PipelineError> {
        let height = rows.len();
        let len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or(PipelineError::Allocation {
                width: width as u64,
                height: height as u64,
            })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| PipelineError::Allocation {
                width: width as u64,
                height: height as u64,
            })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            first_row: rows.start,
            data,
        })
    }

    /// Destination pixel rows covered by this strip.
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        let height = if self.width == 0 {
            0
        } else {
            self.data.len() / self.stride()
        };
        self.first_row..self.first_row + height
    }

    /// Raw bytes of the strip's `offset`-th row.
    #[must_use]
    pub fn row(&self, offset: usize) -> &[u8] {
        let stride = self.stride();
        &self.data[offset * stride..(offset + 1) * stride]
    }

    /// Mutable raw bytes of the strip's `offset`-th row.
    pub fn row_mut(&mut self, offset: usize) -> &mut [u8] {
        let stride = self.stride();
        &mut self.data[offset * stride..(offset + 1) * stride]
    }

    /// Set pixel `x` of the strip's `offset`-th row.
    pub fn put_pixel(&mut self, x: usize, offset: usize, color: [u8; 3]) {
        let start = x * CHANNELS;
        self.row_mut(offset)[start..start + CHANNELS].copy_from_slice(&color);
    }

    const fn stride(&self) -> usize {
        self.width * CHANNELS
    }
}

fn allocate_zeroed(width: u32, height: u32) -> Result<Vec<u8>, PipelineError> {
    if width == 0 || height == 0 {
        return Err(allocation_error(width, height));
    }
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or_else(|| allocation_error(width, height))?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| allocation_error(width, height))?;
    data.resize(len, 0);
    Ok(data)
}

const fn allocation_error(width: u32, height: u32) -> PipelineError {
    PipelineError::Allocation {
        width: width as u64,
        height: height as u64,
    }
}
