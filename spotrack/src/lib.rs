//! Spotrack - sub-pixel spot localization and trajectory linking for
//! single-particle fluorescence microscopy.
//!
//! Each frame goes through detection (binarization, ultimate erosion, local
//! maxima), merging of near-duplicates, Gaussian-masked centroid refinement,
//! SNR/mask/edge filtering and optional width estimation. Frames are
//! independent and run on a worker pool. The per-frame spots are then linked
//! frame by frame into trajectories.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use spotrack::{write_tsv_file, Config, Tracker};
//!
//! let config = Config {
//!     max_displacement: 3.0,
//!     ..Config::default()
//! };
//! let result = Tracker::new(config)?.track(&frames, None)?;
//!
//! println!("Found {} trajectories", result.trajectories.len());
//! write_tsv_file(&result.trajectories, "trajectories.tsv")?;
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod spot_detection;
pub mod tracking;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Configuration and errors
// ============================================================================

pub use config::{
    ApertureConfig, Config, DetectConfig, FilterConfig, LinkConfig, RefineConfig, WidthConfig,
};
pub use error::{ConfigError, Error, Result};

// ============================================================================
// Frame stages
// ============================================================================

pub use spot_detection::{
    Binarization, Binarizer, Candidate, CandidateFilter, CandidateMerger, CentroidRefiner,
    Detection, DistanceMap, FilterStats, FrameDiagnostics, FrameSpots, IntensityMeter, SpotDetector,
    SpotLocator, ThresholdBinarizer, TopHatBinarizer, WidthEstimator,
};

// ============================================================================
// Linking and output
// ============================================================================

pub use tracking::{
    read_tsv, read_tsv_file, write_tsv, write_tsv_file, GreedyMatching, LinkStats, MatchingMethod,
    MatchingStrategy, OptimalMatching, Trajectory, TrajectoryLinker, TrajectoryPoint,
    TrajectoryRecord, TrajectorySet, TRAJECTORY_ID_BASE, TSV_HEADER,
};

// ============================================================================
// Pipeline
// ============================================================================

pub use pipeline::{RunDiagnostics, Tracker, TrackingResult};

// Re-export for downstream users building frames and masks.
pub use common::{BitBuffer2, Buffer2};
