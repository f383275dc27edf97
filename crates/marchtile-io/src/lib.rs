//! marchtile-io: filesystem I/O for the marchtile pipeline.
//!
//! Decodes source rasters, encodes the annotated output, and loads the
//! sixteen contour tiles of a palette directory. All image processing
//! lives in `marchtile-pipeline`.

use std::path::PathBuf;

use marchtile_pipeline::PipelineError;

pub mod palette;
pub mod raster;

pub use palette::{DEFAULT_CONTOURS_DIR, load_palette, tile_path};
pub use raster::{load_raster, save_raster};

/// Errors from reading or writing raster files.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The file could not be opened or read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a decodable image.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image could not be encoded or written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Decoded images did not form a valid raster or palette.
    #[error(transparent)]
    Palette(#[from] PipelineError),
}
