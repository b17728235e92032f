//! Error types for spot tracking.
//!
//! Only fatal conditions are errors. Degraded detection and refinement
//! non-convergence are recoverable and reported through
//! [`FrameDiagnostics`](crate::FrameDiagnostics).

use std::io;

use thiserror::Error;

/// Parameter values that cannot drive a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },

    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("inner_mask_radius ({inner}) must be smaller than halfwidth ({halfwidth})")]
    InnerMaskTooLarge { inner: usize, halfwidth: usize },

    #[error("end_frame ({end}) is before start_frame ({start})")]
    EmptyFrameRange { start: usize, end: usize },

    #[error(
        "structuring_radius {radius} exceeds half of the {width}x{height} frame"
    )]
    StructuringRadiusTooLarge {
        radius: usize,
        width: usize,
        height: usize,
    },

    #[error("sub-image of halfwidth {halfwidth} does not fit in a {width}x{height} frame")]
    HalfwidthTooLarge {
        halfwidth: usize,
        width: usize,
        height: usize,
    },

    #[error("start_frame {start} is beyond the last frame ({num_frames} frames)")]
    StartFrameOutOfRange { start: usize, num_frames: usize },
}

/// Errors that stop a tracking run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(
        "Linking contract violated: trajectory {trajectory} ends at frame {end_frame} \
         and cannot be extended with frame {frame}"
    )]
    LinkingContractViolation {
        trajectory: usize,
        end_frame: usize,
        frame: usize,
    },

    #[error("Frame {frame} linked after frame {previous}; frames must increase")]
    FrameOutOfOrder { previous: usize, frame: usize },

    #[error("No frames to process")]
    NoFrames,

    #[error("Frame {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameDimensionMismatch {
        index: usize,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Mask is {actual_width}x{actual_height}, frames are {width}x{height}")]
    MaskDimensionMismatch {
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Trajectory table line {line}: {message}")]
    TableParse { line: usize, message: String },

    #[error("Trajectory table I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Config file: {0}")]
    ConfigFile(#[from] common::SerdeFormatError),
}

pub type Result<T> = std::result::Result<T, Error>;
