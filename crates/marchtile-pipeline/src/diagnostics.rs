//! Run diagnostics: timing per phase and a summary of the grid.
//!
//! Every call to [`process_with_diagnostics`](crate::process_with_diagnostics)
//! collects these alongside the output raster. Phase durations are the
//! busy time of the slowest worker, which excludes time spent waiting at
//! the barrier.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::palette::CONFIGURATION_COUNT;
use crate::types::Dimensions;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Worker pool size.
    pub workers: usize,
    /// Source raster dimensions.
    pub source: Dimensions,
    /// Dimensions of the normalized (and output) raster.
    pub normalized: Dimensions,
    /// Whether the source was downscaled. When `false` the normalized
    /// raster is the source itself and the rescale phase did no work.
    pub resampled: bool,
    /// RESCALE phase.
    pub rescale: PhaseDiagnostics,
    /// SAMPLE phase.
    pub sample: PhaseDiagnostics,
    /// MARCH phase.
    pub march: PhaseDiagnostics,
    /// Wall-clock duration of the whole run, including thread start-up
    /// and barrier waits (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Grid and tile counts.
    pub summary: GridSummary,
}

/// Diagnostics for one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDiagnostics {
    /// Busy time of the slowest worker (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Rows in the partitioned domain (pixel rows for RESCALE, grid point
    /// rows for SAMPLE, cell rows for MARCH).
    pub domain_rows: usize,
    /// Workers whose partition was non-empty.
    pub busy_workers: usize,
}

/// Counts describing the classification grid and the stamped tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSummary {
    /// Cell rows.
    pub rows: usize,
    /// Cell columns.
    pub cols: usize,
    /// Sample points classified as dark (value 1).
    pub dark_points: usize,
    /// Tiles stamped (`rows * cols`).
    pub tiles_stamped: usize,
    /// Number of cells per configuration index.
    pub configuration_histogram: [usize; CONFIGURATION_COUNT],
}

impl RunDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Run Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Source: {}x{}  ->  normalized: {}x{} ({})",
            self.source.width,
            self.source.height,
            self.normalized.width,
            self.normalized.height,
            if self.resampled {
                "resampled"
            } else {
                "passed through"
            },
        ));
        lines.push(format!(
            "Workers: {}  |  total duration: {:.3}ms",
            self.workers,
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<10} {:>10} {:>10} {:>8}",
            "Phase", "Duration", "Rows", "Busy"
        ));
        lines.push("-".repeat(42));
        for (name, phase) in [
            ("Rescale", &self.rescale),
            ("Sample", &self.sample),
            ("March", &self.march),
        ] {
            lines.push(format!(
                "{name:<10} {:>8.3}ms {:>10} {:>5}/{}",
                duration_ms(phase.duration),
                phase.domain_rows,
                phase.busy_workers,
                self.workers,
            ));
        }

        lines.push(String::new());
        let summary = &self.summary;
        lines.push(format!(
            "Grid: {}x{} cells  |  dark points: {}  |  tiles stamped: {}",
            summary.rows, summary.cols, summary.dark_points, summary.tiles_stamped,
        ));
        lines.push(format!(
            "Configurations: {}",
            format_histogram(&summary.configuration_histogram),
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// `k:count` pairs for every configuration that occurred.
fn format_histogram(histogram: &[usize; CONFIGURATION_COUNT]) -> String {
    let used: Vec<String> = histogram
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(k, count)| format!("{k}:{count}"))
        .collect();
    if used.is_empty() {
        "none".to_owned()
    } else {
        used.join(" ")
    }
}
