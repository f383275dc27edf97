//! Integration test: load a PPM source and a tile directory from disk, run
//! the pipeline, write the result, and read it back.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use marchtile_io::{load_palette, load_raster, save_raster, tile_path};
use marchtile_pipeline::{CONFIGURATION_COUNT, PipelineConfig, RasterBuffer};

const STEP: u32 = 8;

/// Tile `k` is a solid square whose red channel is `k * 16`.
#[allow(clippy::cast_possible_truncation)]
fn write_tile_set(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    for k in 0..CONFIGURATION_COUNT {
        let tile = RasterBuffer::filled(STEP, STEP, [k as u8 * 16, 40, 200]).unwrap();
        save_raster(&tile, tile_path(dir, k)).unwrap();
    }
}

/// A white page with a dark ring, large enough to be downscaled.
fn ring_source() -> RasterBuffer {
    RasterBuffer::from_fn(300, 240, |x, y| {
        let d = (f64::from(x) - 150.0).hypot(f64::from(y) - 120.0);
        if (50.0..80.0).contains(&d) {
            [20, 20, 20]
        } else {
            [250, 250, 250]
        }
    })
}

fn config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        target_width: 128,
        target_height: 96,
        step: STEP,
        workers,
        ..PipelineConfig::default()
    }
}

#[test]
fn ppm_source_through_pipeline_to_ppm_output() {
    let dir = tempfile::tempdir().unwrap();
    let contours = dir.path().join("contours");
    let input = dir.path().join("input.ppm");
    let output = dir.path().join("output.ppm");

    write_tile_set(&contours);
    save_raster(&ring_source(), &input).unwrap();

    let palette = load_palette(&contours).unwrap();
    let source = load_raster(&input).unwrap();
    let (annotated, diagnostics) =
        marchtile_pipeline::process_with_diagnostics(source, &palette, &config(4)).unwrap();
    save_raster(&annotated, &output).unwrap();

    eprintln!("{}", diagnostics.report());
    assert!(diagnostics.resampled);
    assert_eq!(diagnostics.summary.rows, 12);
    assert_eq!(diagnostics.summary.cols, 16);
    assert!(diagnostics.summary.dark_points > 0);

    let reloaded = load_raster(&output).unwrap();
    assert_eq!(reloaded, annotated);
    assert_eq!(reloaded.width(), 128);
    assert_eq!(reloaded.height(), 96);

    // The page corner is bright, so its cell uses tile 0.
    assert_eq!(reloaded.pixel(0, 0), [0, 40, 200]);
    // Some cell on the ring boundary uses a mixed configuration.
    let mixed = diagnostics.summary.configuration_histogram[1..15]
        .iter()
        .sum::<usize>();
    assert!(mixed > 0, "expected edge tiles along the ring");
}

#[test]
fn output_file_does_not_depend_on_worker_count() {
    let dir = tempfile::tempdir().unwrap();
    let contours = dir.path().join("contours");
    write_tile_set(&contours);
    let palette = load_palette(&contours).unwrap();

    let mut outputs = Vec::new();
    for workers in [1, 3, 8] {
        let path = dir.path().join(format!("out-{workers}.ppm"));
        let annotated =
            marchtile_pipeline::process(ring_source(), &palette, &config(workers)).unwrap();
        save_raster(&annotated, &path).unwrap();
        outputs.push(std::fs::read(&path).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0], outputs[2]);
}

#[test]
fn tile_size_must_match_step() {
    let dir = tempfile::tempdir().unwrap();
    let contours = dir.path().join("contours");
    write_tile_set(&contours);
    let palette = load_palette(&contours).unwrap();

    let config = PipelineConfig {
        step: STEP * 2,
        ..config(2)
    };
    let result = marchtile_pipeline::process(ring_source(), &palette, &config);
    assert!(matches!(
        result,
        Err(marchtile_pipeline::PipelineError::Configuration(_))
    ));
}
