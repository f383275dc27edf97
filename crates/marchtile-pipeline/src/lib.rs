//! marchtile-pipeline: marching-squares contour annotation (sans-IO).
//!
//! Turns an RGB raster into a tiled contour rendering through three
//! phases run by a fixed pool of worker threads:
//! rescale -> sample -> march.
//!
//! 1. **Rescale**: sources larger than the working resolution on both
//!    axes are bicubically downscaled to it. Smaller sources are used as
//!    they are.
//! 2. **Sample**: a lattice of points every `step` pixels is classified
//!    dark (1) or bright (0) by average luminance.
//! 3. **March**: each grid cell's four corners select one of sixteen
//!    palette tiles, which is stamped over the cell.
//!
//! This crate has **no I/O dependencies**. Decoding, encoding and loading
//! palettes from disk live in `marchtile-io`.

pub mod diagnostics;
pub mod grid;
pub mod palette;
pub mod partition;
pub mod pipeline;
pub mod raster;
pub mod resample;
pub mod stitch;
pub mod types;

pub use diagnostics::{GridSummary, PhaseDiagnostics, RunDiagnostics};
pub use grid::{ClassificationGrid, GridShape};
pub use palette::{CONFIGURATION_COUNT, TilePalette};
pub use partition::Partition;
pub use pipeline::Phase;
pub use raster::{PixelStrip, RasterBuffer};
pub use types::{Dimensions, PipelineConfig, PipelineError, RgbImage};

/// Run the full pipeline and return the annotated raster.
///
/// The output has the normalized raster's dimensions: the working
/// resolution if the source was downscaled, otherwise the source's own.
///
/// # Errors
///
/// See [`process_with_diagnostics`].
pub fn process(
    source: RasterBuffer,
    palette: &TilePalette,
    config: &PipelineConfig,
) -> Result<RasterBuffer, PipelineError> {
    process_with_diagnostics(source, palette, config).map(|(output, _)| output)
}

/// Run the full pipeline, also returning per-phase timing and grid
/// statistics.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] if `config` is invalid or the
/// palette's tiles are not `step x step`.
/// Returns [`PipelineError::Allocation`] if a buffer cannot be allocated.
/// Returns [`PipelineError::Thread`] if a worker cannot be started or
/// panics.
pub fn process_with_diagnostics(
    source: RasterBuffer,
    palette: &TilePalette,
    config: &PipelineConfig,
) -> Result<(RasterBuffer, RunDiagnostics), PipelineError> {
    pipeline::run(source, palette, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const WHITE: [u8; 3] = [255, 255, 255];
    const BLACK: [u8; 3] = [0, 0, 0];

    #[allow(clippy::cast_possible_truncation)]
    fn indexed_palette(step: u32) -> TilePalette {
        TilePalette::solid(step, |k| [k as u8, 100, 200])
    }

    /// 48x48 white raster with a dark 20x30 block in the top-left.
    fn dark_block() -> RasterBuffer {
        RasterBuffer::from_fn(48, 48, |x, y| if x < 20 && y < 30 { BLACK } else { WHITE })
    }

    #[test]
    fn process_matches_diagnostics_output() {
        let source = dark_block();
        let palette = indexed_palette(8);
        let config = PipelineConfig {
            workers: 3,
            ..PipelineConfig::default()
        };
        let plain = process(source.clone(), &palette, &config).unwrap();
        let (with_diagnostics, diagnostics) =
            process_with_diagnostics(source, &palette, &config).unwrap();
        assert_eq!(plain, with_diagnostics);
        assert_eq!(diagnostics.normalized, Dimensions::new(48, 48));
    }

    #[test]
    fn dark_block_produces_edge_tiles() {
        // Dark points: x in {0, 8, 16}, y in {0, 8, 16, 24}.
        let source = dark_block();
        let palette = indexed_palette(8);
        let output = process(source, &palette, &PipelineConfig::default()).unwrap();

        // Cell (0, 0): all four corners dark.
        assert_eq!(output.pixel(0, 0)[0], 15);
        // Cell (0, 2): left corners dark, right corners bright -> 8 + 1.
        assert_eq!(output.pixel(16, 0)[0], 9);
        // Cell (3, 0): top corners dark, bottom corners bright -> 8 + 4.
        assert_eq!(output.pixel(0, 24)[0], 12);
        // Cell (3, 2): only the top-left corner is dark.
        assert_eq!(output.pixel(16, 24)[0], 8);
        // Cell (5, 5): all bright.
        assert_eq!(output.pixel(40, 40)[0], 0);
    }
}
