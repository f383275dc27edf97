//! Contour tile sets on disk.
//!
//! A tile set is a directory holding `0.ppm` through `15.ppm`, one image
//! per corner configuration. Any format [`load_raster`] understands is
//! accepted as long as the file carries the `.ppm` name.

use std::path::{Path, PathBuf};

use marchtile_pipeline::{CONFIGURATION_COUNT, TilePalette};
use tracing::info;

use crate::IoError;
use crate::raster::load_raster;

/// Tile directory used when none is given.
pub const DEFAULT_CONTOURS_DIR: &str = "./contours";

/// Path of tile `index` inside `dir`.
#[must_use]
pub fn tile_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.ppm"))
}

/// Load the 16 tiles of `dir` into a palette.
///
/// # Errors
///
/// Returns the [`IoError`] of the first tile that cannot be read or
/// decoded, or [`IoError::Palette`] if the tiles differ in size.
pub fn load_palette(dir: impl AsRef<Path>) -> Result<TilePalette, IoError> {
    let dir = dir.as_ref();
    let tiles = (0..CONFIGURATION_COUNT)
        .map(|index| load_raster(tile_path(dir, index)))
        .collect::<Result<Vec<_>, _>>()?;
    let palette = TilePalette::try_from(tiles)?;

    let size = palette.tile_dimensions();
    info!(
        dir = %dir.display(),
        tile_width = size.width,
        tile_height = size.height,
        "loaded contour tiles",
    );
    Ok(palette)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marchtile_pipeline::{PipelineError, RasterBuffer};

    use super::*;
    use crate::raster::save_raster;

    #[allow(clippy::cast_possible_truncation)]
    fn write_tiles(dir: &Path, size: impl Fn(usize) -> u32) {
        for k in 0..CONFIGURATION_COUNT {
            let tile = RasterBuffer::filled(size(k), size(k), [k as u8 * 16, 0, 0]).unwrap();
            save_raster(&tile, tile_path(dir, k)).unwrap();
        }
    }

    #[test]
    fn tile_paths_are_numbered() {
        let dir = Path::new("contours");
        assert_eq!(tile_path(dir, 0), Path::new("contours/0.ppm"));
        assert_eq!(tile_path(dir, 15), Path::new("contours/15.ppm"));
    }

    #[test]
    fn loads_tiles_in_configuration_order() {
        let dir = tempfile::tempdir().unwrap();
        write_tiles(dir.path(), |_| 4);
        let palette = load_palette(dir.path()).unwrap();
        assert_eq!(palette.tile_dimensions().width, 4);
        for k in 0..CONFIGURATION_COUNT {
            #[allow(clippy::cast_possible_truncation)]
            let expected = [k as u8 * 16, 0, 0];
            assert_eq!(palette.tile(k).pixel(3, 3), expected, "tile {k}");
        }
    }

    #[test]
    fn missing_tile_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        write_tiles(dir.path(), |_| 4);
        std::fs::remove_file(tile_path(dir.path(), 11)).unwrap();
        let err = load_palette(dir.path()).unwrap_err();
        assert!(matches!(&err, IoError::Read { path, .. } if path.ends_with("11.ppm")));
    }

    #[test]
    fn mismatched_tile_is_a_palette_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tiles(dir.path(), |k| if k == 5 { 6 } else { 4 });
        let err = load_palette(dir.path()).unwrap_err();
        assert!(matches!(
            &err,
            IoError::Palette(PipelineError::Configuration(msg)) if msg.contains("tile 5")
        ));
    }
}
