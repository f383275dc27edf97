//! Shared types for the marchtile processing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can hand rasters to the
/// pipeline without depending on `image` directly.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new pair of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` when `self` is strictly larger than `bounds` on
    /// both axes.
    #[must_use]
    pub const fn exceeds(self, bounds: Self) -> bool {
        self.width > bounds.width && self.height > bounds.height
    }
}

/// Configuration for a marching-squares run.
///
/// Defaults: a 2048x2048 working resolution, an 8-pixel sampling step,
/// a luminance cutoff of 200 and a single worker.
///
/// Fields are public; [`validate`](Self::validate) checks the invariants
/// and is called by [`crate::process`] before any worker starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working resolution width. Sources larger than the working
    /// resolution on both axes are downscaled to exactly this size.
    pub target_width: u32,

    /// Working resolution height.
    pub target_height: u32,

    /// Distance in pixels between neighboring grid sample points. Every
    /// palette tile must be `step x step` pixels.
    pub step: u32,

    /// Binarization cutoff. A sample whose average channel value is at
    /// or below the threshold counts as inside the contour (grid value 1).
    pub threshold: u8,

    /// Number of worker threads. Must be at least 1.
    pub workers: usize,
}

impl PipelineConfig {
    /// Default working resolution width in pixels.
    pub const DEFAULT_TARGET_WIDTH: u32 = 2048;

    /// Default working resolution height in pixels.
    pub const DEFAULT_TARGET_HEIGHT: u32 = 2048;

    /// Default grid spacing in pixels.
    pub const DEFAULT_STEP: u32 = 8;

    /// Default binarization cutoff.
    pub const DEFAULT_THRESHOLD: u8 = 200;

    /// Default worker count.
    pub const DEFAULT_WORKERS: usize = 1;

    /// Working resolution as [`Dimensions`].
    #[must_use]
    pub const fn target(&self) -> Dimensions {
        Dimensions::new(self.target_width, self.target_height)
    }

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if `workers` or `step`
    /// is zero, or if either working resolution axis is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::Configuration(
                "worker count must be at least 1".to_owned(),
            ));
        }
        if self.step == 0 {
            return Err(PipelineError::Configuration(
                "sampling step must be at least 1 pixel".to_owned(),
            ));
        }
        if self.target_width == 0 || self.target_height == 0 {
            return Err(PipelineError::Configuration(format!(
                "working resolution must be non-zero, got {}x{}",
                self.target_width, self.target_height,
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: Self::DEFAULT_TARGET_WIDTH,
            target_height: Self::DEFAULT_TARGET_HEIGHT,
            step: Self::DEFAULT_STEP,
            threshold: Self::DEFAULT_THRESHOLD,
            workers: Self::DEFAULT_WORKERS,
        }
    }
}

/// Errors that can occur while running the pipeline.
///
/// None of these are recoverable in place: the driver is expected to
/// abort the run and write no output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// A raster buffer or the classification grid could not be allocated.
    #[error("unable to allocate a {width}x{height} buffer")]
    Allocation {
        /// Requested width (pixels or grid columns).
        width: u64,
        /// Requested height (pixels or grid rows).
        height: u64,
    },

    /// The configuration or the tile palette is inconsistent.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A worker thread could not be spawned, panicked, or left shared
    /// state poisoned.
    #[error("worker thread failure: {0}")]
    Thread(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.target(), Dimensions::new(2048, 2048));
        assert_eq!(config.step, 8);
        assert_eq!(config.threshold, 200);
        assert_eq!(config.workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn zero_step_is_rejected() {
        let config = PipelineConfig {
            step: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn zero_target_is_rejected() {
        let config = PipelineConfig {
            target_height: 0,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("2048x0"), "got: {err}");
    }

    #[test]
    fn exceeds_requires_both_axes() {
        let bounds = Dimensions::new(100, 100);
        assert!(Dimensions::new(101, 101).exceeds(bounds));
        assert!(!Dimensions::new(101, 100).exceeds(bounds));
        assert!(!Dimensions::new(100, 101).exceeds(bounds));
        assert!(!Dimensions::new(50, 500).exceeds(bounds));
    }

    #[test]
    fn config_json_round_trip_with_partial_fields() {
        let config: PipelineConfig = serde_json::from_str(r#"{"workers": 4, "step": 16}"#).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.step, 16);
        assert_eq!(config.threshold, PipelineConfig::DEFAULT_THRESHOLD);

        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn error_display_and_serde() {
        let err = PipelineError::Allocation {
            width: 10,
            height: 20,
        };
        assert_eq!(err.to_string(), "unable to allocate a 10x20 buffer");

        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
