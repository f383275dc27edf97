//! Raster file decoding and encoding.
//!
//! The format is detected from the file contents on load and chosen by
//! extension on save. Every source is converted to 8-bit RGB.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder, ImageError, ImageReader};
use marchtile_pipeline::RasterBuffer;
use tracing::debug;

use crate::IoError;

/// Read and decode an image file into an RGB raster.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file cannot be opened,
/// [`IoError::Decode`] if its contents are not a supported image, and
/// [`IoError::Palette`] if the image has a zero dimension.
pub fn load_raster(path: impl AsRef<Path>) -> Result<RasterBuffer, IoError> {
    let path = path.as_ref();
    let read_error = |source: std::io::Error| IoError::Read {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::open(path)
        .map_err(read_error)?
        .with_guessed_format()
        .map_err(read_error)?;
    let format = reader.format();
    let image = reader.decode().map_err(|source| IoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %path.display(),
        ?format,
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "decoded raster",
    );

    Ok(RasterBuffer::from_image(image.to_rgb8())?)
}

/// Encode `raster` to `path`, choosing the format from its extension.
///
/// A `.ppm` or `.pnm` path produces a binary (P6) pixmap.
///
/// # Errors
///
/// Returns [`IoError::Write`] if the extension is not a supported format
/// or the file cannot be written.
pub fn save_raster(raster: &RasterBuffer, path: impl AsRef<Path>) -> Result<(), IoError> {
    let path = path.as_ref();
    let written = if is_pixmap_path(path) {
        write_pixmap(raster, path)
    } else {
        raster.as_image().save(path)
    };
    written.map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        width = raster.width(),
        height = raster.height(),
        "wrote raster",
    );
    Ok(())
}

/// `image` encodes `.ppm` as PAM (P7) unless a subtype is requested.
fn is_pixmap_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ppm") || ext.eq_ignore_ascii_case("pnm"))
}

fn write_pixmap(raster: &RasterBuffer, path: &Path) -> Result<(), ImageError> {
    let mut writer = BufWriter::new(File::create(path)?);
    PnmEncoder::new(&mut writer)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
        .write_image(
            raster.as_image().as_raw(),
            raster.width(),
            raster.height(),
            ExtendedColorType::Rgb8,
        )?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation)]
    fn gradient() -> RasterBuffer {
        RasterBuffer::from_fn(7, 5, |x, y| [(x * 30) as u8, (y * 50) as u8, 9])
    }

    #[test]
    fn ppm_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.ppm");
        let raster = gradient();
        save_raster(&raster, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6"), "header {:?}", &bytes[..2]);
        assert!(bytes.ends_with(raster.as_image().as_raw()));
        assert_eq!(load_raster(&path).unwrap(), raster);
    }

    #[test]
    fn pixmap_extensions_write_binary_ppm() {
        let dir = tempfile::tempdir().unwrap();
        let raster = RasterBuffer::filled(64, 32, [255, 255, 255]).unwrap();
        for name in ["white.ppm", "white.PPM", "white.pnm"] {
            let path = dir.path().join(name);
            save_raster(&raster, &path).unwrap();
            let bytes = std::fs::read(&path).unwrap();
            assert!(bytes.starts_with(b"P6"), "{name} is not a P6 pixmap");
            assert!(!bytes.starts_with(b"P7"));
            // Header plus exactly width * height * 3 sample bytes.
            assert!(bytes.len() > 64 * 32 * 3);
            assert!(bytes.len() < 64 * 32 * 3 + 32);
        }
    }

    #[test]
    fn unwritable_pixmap_path_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.ppm");
        let err = save_raster(&gradient(), &path).unwrap_err();
        assert!(matches!(&err, IoError::Write { path: p, .. } if *p == path));
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        let raster = gradient();
        save_raster(&raster, &path).unwrap();
        assert_eq!(load_raster(&path).unwrap(), raster);
    }

    #[test]
    fn format_is_detected_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let ppm = dir.path().join("image.ppm");
        let disguised = dir.path().join("image.dat");
        save_raster(&gradient(), &ppm).unwrap();
        std::fs::rename(&ppm, &disguised).unwrap();
        assert_eq!(load_raster(&disguised).unwrap(), gradient());
    }

    #[test]
    fn grayscale_source_is_expanded_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([77]))
            .save(&path)
            .unwrap();
        let raster = load_raster(&path).unwrap();
        assert_eq!(raster.pixel(2, 1), [77, 77, 77]);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.ppm");
        let err = load_raster(&path).unwrap_err();
        assert!(matches!(&err, IoError::Read { path: p, .. } if *p == path));
        assert!(err.to_string().contains("absent.ppm"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.ppm");
        std::fs::write(&path, b"P6\nnot an image").unwrap();
        assert!(matches!(load_raster(&path), Err(IoError::Decode { .. })));
    }

    #[test]
    fn unknown_extension_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.unknown");
        assert!(matches!(
            save_raster(&gradient(), &path),
            Err(IoError::Write { .. })
        ));
    }
}
