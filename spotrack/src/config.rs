//! Run parameters and the stage-scoped views handed to each pipeline stage.
//!
//! [`Config`] is the flat, serializable bundle a run is configured with. Each
//! stage only ever sees its own slice of it ([`DetectConfig`],
//! [`RefineConfig`], [`FilterConfig`], [`ApertureConfig`], [`WidthConfig`],
//! [`LinkConfig`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::spot_detection::Binarization;
use crate::tracking::MatchingMethod;

/// Parameters for one tracking run.
///
/// Defaults follow the reference pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config {
///     max_displacement: 3.0,
///     num_workers: 0,
///     ..Config::default()
/// };
/// config.validate()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -- Detection --
    /// Radius of the structuring disk used by the foreground binarizer.
    pub structuring_radius: usize,
    /// Threshold offset handed to the binarizer, in units of background spread.
    pub threshold_offset: f64,
    /// Stock binarizer used when none is injected.
    pub binarization: Binarization,
    /// Blur the frame with a 3x3 Gaussian before top-hat filtering.
    pub gaussian_prefilter: bool,
    /// Search radius of the ultimate-erosion distance map.
    pub erosion_search_radius: usize,

    // -- Centroid refinement --
    /// Half-width of the square sub-image around each spot.
    pub halfwidth: usize,
    /// Radius of the circular signal mask. Must be smaller than `halfwidth`.
    pub inner_mask_radius: usize,
    /// Sigma of the Gaussian weighting mask.
    pub gauss_mask_sigma: f64,
    /// Maximum refinement iterations per spot.
    pub max_iterations: usize,
    /// Spots with SNR at or below this value are discarded.
    pub snr_cutoff: f64,

    // -- Width estimation --
    /// Fit a 2-D Gaussian to every surviving spot.
    pub estimate_widths: bool,
    /// Width reported when the fit fails.
    pub psf_width: f64,

    // -- Linking --
    /// Largest frame-to-frame displacement still considered the same particle.
    pub max_displacement: f64,
    /// Trajectories shorter than this are discarded.
    pub min_traj_len: usize,
    /// Candidate-to-trajectory assignment policy.
    pub matching: MatchingMethod,

    // -- Run --
    /// Frame-stage worker threads. 0 runs sequentially.
    pub num_workers: usize,
    /// First frame of the stack to analyse.
    pub start_frame: usize,
    /// Last frame of the stack to analyse (inclusive). `None` uses all frames.
    pub end_frame: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Detection
            structuring_radius: 5,
            threshold_offset: 1.0,
            binarization: Binarization::TopHat,
            gaussian_prefilter: true,
            erosion_search_radius: 16,

            // Centroid refinement
            halfwidth: 8,
            inner_mask_radius: 5,
            gauss_mask_sigma: 2.0,
            max_iterations: 1000,
            snr_cutoff: 0.4,

            // Width estimation
            estimate_widths: true,
            psf_width: 1.33,

            // Linking
            max_displacement: 5.0,
            min_traj_len: 3,
            matching: MatchingMethod::Greedy,

            // Run
            num_workers: common::parallel::available_workers(),
            start_frame: 0,
            end_frame: None,
        }
    }
}

impl Config {
    /// Load from a YAML or JSON file, chosen by extension. Missing keys take
    /// their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = common::file_format::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Write to a YAML or JSON file, chosen by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        common::file_format::save_file(self, path)?;
        Ok(())
    }

    /// Check parameter ranges that do not depend on the frames.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        at_least("structuring_radius", self.structuring_radius, 1)?;
        at_least("erosion_search_radius", self.erosion_search_radius, 1)?;
        at_least("halfwidth", self.halfwidth, 1)?;
        at_least("max_iterations", self.max_iterations, 1)?;
        at_least("min_traj_len", self.min_traj_len, 1)?;

        if self.inner_mask_radius >= self.halfwidth {
            return Err(ConfigError::InnerMaskTooLarge {
                inner: self.inner_mask_radius,
                halfwidth: self.halfwidth,
            });
        }

        positive("gauss_mask_sigma", self.gauss_mask_sigma)?;
        positive("max_displacement", self.max_displacement)?;
        positive("psf_width", self.psf_width)?;
        finite("threshold_offset", self.threshold_offset)?;
        finite("snr_cutoff", self.snr_cutoff)?;

        if let Some(end) = self.end_frame {
            if end < self.start_frame {
                return Err(ConfigError::EmptyFrameRange {
                    start: self.start_frame,
                    end,
                });
            }
        }

        Ok(())
    }

    /// Check radius and half-width against the frame dimensions.
    pub fn validate_for_frame(
        &self,
        width: usize,
        height: usize,
    ) -> std::result::Result<(), ConfigError> {
        let min_dim = width.min(height);
        if self.structuring_radius > min_dim / 2 {
            return Err(ConfigError::StructuringRadiusTooLarge {
                radius: self.structuring_radius,
                width,
                height,
            });
        }
        if 2 * self.halfwidth + 1 > min_dim {
            return Err(ConfigError::HalfwidthTooLarge {
                halfwidth: self.halfwidth,
                width,
                height,
            });
        }
        Ok(())
    }

    pub fn detect(&self) -> DetectConfig {
        DetectConfig {
            structuring_radius: self.structuring_radius,
            threshold_offset: self.threshold_offset,
            binarization: self.binarization,
            gaussian_prefilter: self.gaussian_prefilter,
            erosion_search_radius: self.erosion_search_radius,
        }
    }

    pub fn refine(&self) -> RefineConfig {
        RefineConfig {
            halfwidth: self.halfwidth,
            inner_mask_radius: self.inner_mask_radius,
            gauss_mask_sigma: self.gauss_mask_sigma,
            max_iterations: self.max_iterations,
            snr_cutoff: self.snr_cutoff,
        }
    }

    pub fn filter(&self) -> FilterConfig {
        FilterConfig {
            snr_cutoff: self.snr_cutoff,
            halfwidth: self.halfwidth,
        }
    }

    pub fn aperture(&self) -> ApertureConfig {
        ApertureConfig {
            halfwidth: self.halfwidth,
            inner_mask_radius: self.inner_mask_radius,
        }
    }

    pub fn width(&self) -> WidthConfig {
        WidthConfig {
            halfwidth: self.halfwidth,
            inner_mask_radius: self.inner_mask_radius,
            psf_width: self.psf_width,
        }
    }

    pub fn link(&self) -> LinkConfig {
        LinkConfig {
            max_displacement: self.max_displacement,
            min_traj_len: self.min_traj_len,
        }
    }
}

fn at_least(name: &'static str, value: usize, min: usize) -> std::result::Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { name, min, value });
    }
    Ok(())
}

fn positive(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::NotPositive { name, value });
    }
    Ok(())
}

fn finite(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { name, value });
    }
    Ok(())
}

/// Parameters of [`SpotDetector`](crate::SpotDetector).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectConfig {
    pub structuring_radius: usize,
    pub threshold_offset: f64,
    pub binarization: Binarization,
    pub gaussian_prefilter: bool,
    pub erosion_search_radius: usize,
}

/// Parameters of [`CentroidRefiner`](crate::CentroidRefiner).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineConfig {
    pub halfwidth: usize,
    pub inner_mask_radius: usize,
    pub gauss_mask_sigma: f64,
    pub max_iterations: usize,
    pub snr_cutoff: f64,
}

/// Parameters of [`CandidateFilter`](crate::CandidateFilter).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub snr_cutoff: f64,
    pub halfwidth: usize,
}

/// Parameters of [`IntensityMeter`](crate::IntensityMeter).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureConfig {
    pub halfwidth: usize,
    pub inner_mask_radius: usize,
}

/// Parameters of [`WidthEstimator`](crate::WidthEstimator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthConfig {
    pub halfwidth: usize,
    pub inner_mask_radius: usize,
    pub psf_width: f64,
}

/// Parameters of [`TrajectoryLinker`](crate::TrajectoryLinker).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    pub max_displacement: f64,
    pub min_traj_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn inner_mask_must_fit_inside_halfwidth() {
        let config = Config {
            halfwidth: 4,
            inner_mask_radius: 4,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InnerMaskTooLarge {
                inner: 4,
                halfwidth: 4
            })
        );
    }

    #[test]
    fn zero_radius_rejected() {
        let config = Config {
            structuring_radius: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall {
                name: "structuring_radius",
                ..
            })
        ));
    }

    #[test]
    fn non_positive_sigma_rejected() {
        for sigma in [0.0, -1.0, f64::NAN] {
            let config = Config {
                gauss_mask_sigma: sigma,
                ..Config::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::NotPositive {
                    name: "gauss_mask_sigma",
                    ..
                })
            ));
        }
    }

    #[test]
    fn reversed_frame_range_rejected() {
        let config = Config {
            start_frame: 5,
            end_frame: Some(2),
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyFrameRange { start: 5, end: 2 })
        );
    }

    #[test]
    fn frame_dimensions_bound_radii() {
        let config = Config {
            structuring_radius: 3,
            halfwidth: 4,
            inner_mask_radius: 2,
            ..Config::default()
        };
        config.validate_for_frame(10, 10).unwrap();
        assert!(matches!(
            config.validate_for_frame(10, 5),
            Err(ConfigError::StructuringRadiusTooLarge { .. })
        ));
        assert!(matches!(
            config.validate_for_frame(8, 20),
            Err(ConfigError::HalfwidthTooLarge { .. })
        ));
    }

    #[test]
    fn stage_views_carry_their_fields() {
        let config = Config {
            snr_cutoff: 1.5,
            halfwidth: 6,
            max_displacement: 2.5,
            ..Config::default()
        };
        assert_eq!(config.refine().snr_cutoff, 1.5);
        assert_eq!(config.filter().snr_cutoff, 1.5);
        assert_eq!(config.filter().halfwidth, 6);
        assert_eq!(config.width().halfwidth, 6);
        assert_eq!(config.link().max_displacement, 2.5);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = common::file_format::deserialize(
            "max_displacement: 3.0\nbinarization: threshold\nmatching: optimal\n",
            common::SerdeFormat::Yaml,
        )
        .unwrap();
        assert_eq!(config.max_displacement, 3.0);
        assert_eq!(config.binarization, Binarization::Threshold);
        assert_eq!(config.matching, MatchingMethod::Optimal);
        assert_eq!(config.halfwidth, Config::default().halfwidth);
    }

    #[test]
    fn file_round_trip() {
        let dir = std::env::temp_dir().join(format!("spotrack-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config {
            min_traj_len: 7,
            end_frame: Some(40),
            num_workers: 2,
            ..Config::default()
        };
        for name in ["run.yaml", "run.json"] {
            let path = dir.join(name);
            config.save(&path).unwrap();
            assert_eq!(Config::from_file(&path).unwrap(), config);
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
