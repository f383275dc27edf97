//! The 16 contour tiles stamped by the stitcher.
//!
//! Tile `k` is drawn for a grid cell whose corner configuration index is
//! `k` (see [`crate::stitch::configuration_index`]). All tiles must share
//! one size; the check happens once here so composition can copy rows
//! without re-validating.

use crate::raster::RasterBuffer;
use crate::types::{Dimensions, PipelineError};

/// Number of distinct 2x2 corner configurations.
pub const CONFIGURATION_COUNT: usize = 16;

/// An immutable, uniformly sized set of contour tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePalette {
    tiles: [RasterBuffer; CONFIGURATION_COUNT],
    tile_dimensions: Dimensions,
}

impl TilePalette {
    /// Build a palette from 16 tiles indexed by configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] naming the first tile
    /// whose dimensions differ from tile 0.
    pub fn new(tiles: [RasterBuffer; CONFIGURATION_COUNT]) -> Result<Self, PipelineError> {
        let tile_dimensions = tiles[0].dimensions();
        if let Some((index, tile)) = tiles
            .iter()
            .enumerate()
            .find(|(_, tile)| tile.dimensions() != tile_dimensions)
        {
            let found = tile.dimensions();
            return Err(PipelineError::Configuration(format!(
                "contour tile {index} is {}x{}, expected {}x{} like tile 0",
                found.width, found.height, tile_dimensions.width, tile_dimensions.height,
            )));
        }
        Ok(Self {
            tiles,
            tile_dimensions,
        })
    }

    /// Build a palette where tile `k` is a solid `size x size` square of
    /// `color(k)`.
    ///
    /// Handy for debugging output and for tests, since every stamped cell
    /// then identifies its configuration by color.
    #[must_use]
    pub fn solid(size: u32, mut color: impl FnMut(usize) -> [u8; 3]) -> Self {
        let tiles = std::array::from_fn(|k| {
            let c = color(k);
            RasterBuffer::from_fn(size, size, |_, _| c)
        });
        Self {
            tiles,
            tile_dimensions: Dimensions::new(size, size),
        }
    }

    /// The tile for configuration index `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 16`.
    #[must_use]
    pub fn tile(&self, index: usize) -> &RasterBuffer {
        &self.tiles[index]
    }

    /// Shared dimensions of every tile.
    #[must_use]
    pub const fn tile_dimensions(&self) -> Dimensions {
        self.tile_dimensions
    }

    /// Check that the tiles exactly cover one `step x step` grid cell.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] on a mismatch.
    pub fn ensure_tile_size(&self, step: u32) -> Result<(), PipelineError> {
        let dims = self.tile_dimensions;
        if dims.width != step || dims.height != step {
            return Err(PipelineError::Configuration(format!(
                "contour tiles are {}x{} but the sampling step is {step}",
                dims.width, dims.height,
            )));
        }
        Ok(())
    }
}

impl TryFrom<Vec<RasterBuffer>> for TilePalette {
    type Error = PipelineError;

    fn try_from(tiles: Vec<RasterBuffer>) -> Result<Self, Self::Error> {
        let count = tiles.len();
        let tiles: [RasterBuffer; CONFIGURATION_COUNT] = tiles.try_into().map_err(|_| {
            PipelineError::Configuration(format!(
                "expected {CONFIGURATION_COUNT} contour tiles, got {count}"
            ))
        })?;
        Self::new(tiles)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tile(size: u32, shade: u8) -> RasterBuffer {
        RasterBuffer::from_fn(size, size, |_, _| [shade, shade, shade])
    }

    #[test]
    fn uniform_tiles_are_accepted() {
        let tiles: Vec<_> = (0..16).map(|k| tile(4, k * 10)).collect();
        let palette = TilePalette::try_from(tiles).unwrap();
        assert_eq!(palette.tile_dimensions(), Dimensions::new(4, 4));
        assert_eq!(palette.tile(15).pixel(0, 0), [150, 150, 150]);
    }

    #[test]
    fn mismatched_tile_is_reported_by_index() {
        let mut tiles: Vec<_> = (0..16).map(|_| tile(4, 0)).collect();
        tiles[9] = tile(5, 0);
        let err = TilePalette::try_from(tiles).unwrap_err();
        assert!(
            matches!(
                &err,
                PipelineError::Configuration(msg) if msg.contains("tile 9") && msg.contains("5x5")
            ),
            "got: {err}",
        );
    }

    #[test]
    fn wrong_tile_count_is_rejected() {
        let tiles: Vec<_> = (0..15).map(|_| tile(4, 0)).collect();
        assert!(matches!(
            TilePalette::try_from(tiles),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn tile_size_must_match_step() {
        let palette = TilePalette::solid(8, |_| [0, 0, 0]);
        assert!(palette.ensure_tile_size(8).is_ok());
        assert!(matches!(
            palette.ensure_tile_size(4),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn solid_palette_colors_by_index() {
        let palette = TilePalette::solid(2, |k| [k as u8, 0, 0]);
        for k in 0..CONFIGURATION_COUNT {
            assert_eq!(palette.tile(k).pixel(1, 1), [k as u8, 0, 0]);
        }
    }
}
