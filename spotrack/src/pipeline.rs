//! Whole-stack runs: frame stages on a worker pool, then sequential linking.

use std::ops::Range;
use std::sync::Arc;

use common::parallel::par_map_indexed;
use common::{BitBuffer2, Buffer2};

use crate::config::Config;
use crate::error::{ConfigError, Error, Result};
use crate::spot_detection::{Binarizer, FrameDiagnostics, FrameSpots, SpotLocator};
use crate::tracking::{LinkStats, MatchingStrategy, TrajectoryLinker, TrajectorySet};

/// Per-frame and linking counts of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunDiagnostics {
    /// Absolute index of the first analysed frame.
    pub first_frame: usize,
    /// One entry per analysed frame, in frame order.
    pub frames: Vec<FrameDiagnostics>,
    pub link: LinkStats,
}

impl RunDiagnostics {
    /// Spots handed to the linker over all frames.
    pub fn total_spots(&self) -> usize {
        self.frames.iter().map(|f| f.final_count).sum()
    }

    pub fn degraded_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.degraded()).count()
    }

    pub fn unconverged(&self) -> usize {
        self.frames.iter().map(|f| f.unconverged).sum()
    }
}

#[derive(Debug, Clone)]
pub struct TrackingResult {
    pub trajectories: TrajectorySet,
    pub diagnostics: RunDiagnostics,
}

/// Runs localization and linking over a frame stack.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = Tracker::new(Config::default())?;
/// let result = tracker.track(&frames, None)?;
/// write_tsv_file(&result.trajectories, "trajectories.tsv")?;
/// ```
#[derive(Debug)]
pub struct Tracker {
    config: Config,
    locator: SpotLocator,
    matching: Arc<dyn MatchingStrategy>,
}

impl Tracker {
    /// Tracker with the stock binarizer and matching selected by `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            locator: SpotLocator::new(&config),
            matching: config.matching.build(),
            config,
        })
    }

    /// Replace the stock binarizer.
    pub fn with_binarizer(mut self, binarizer: Box<dyn Binarizer>) -> Self {
        self.locator = SpotLocator::with_binarizer(&self.config, binarizer);
        self
    }

    /// Replace the stock matching strategy.
    pub fn with_matching(mut self, matching: Arc<dyn MatchingStrategy>) -> Self {
        self.matching = matching;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Localize spots in every frame of the configured range.
    ///
    /// `frames` is the whole stack; output frame indices are absolute.
    /// `mask`, when given, must match the frame dimensions.
    pub fn locate(&self, frames: &[Buffer2<f32>], mask: Option<&BitBuffer2>) -> Result<Vec<FrameSpots>> {
        let range = self.frame_range(frames, mask)?;
        let first = range.start;

        tracing::info!(
            first_frame = first,
            frames = range.len(),
            workers = self.config.num_workers,
            "Locating spots"
        );

        let spots = par_map_indexed(&frames[range], self.config.num_workers, |i, frame| {
            self.locator.locate(first + i, frame, mask)
        })?;
        Ok(spots)
    }

    /// Link already localized frames. `spots` must be in frame order.
    pub fn link(&self, spots: &[FrameSpots]) -> Result<(TrajectorySet, LinkStats)> {
        let mut linker = TrajectoryLinker::with_strategy(self.config.link(), Arc::clone(&self.matching));
        for frame in spots {
            linker.push_frame(frame.frame, &frame.candidates)?;
        }
        Ok(linker.finish())
    }

    /// Localize and link.
    pub fn track(&self, frames: &[Buffer2<f32>], mask: Option<&BitBuffer2>) -> Result<TrackingResult> {
        let spots = self.locate(frames, mask)?;
        let (trajectories, link) = self.link(&spots)?;

        let diagnostics = RunDiagnostics {
            first_frame: spots.first().map_or(0, |s| s.frame),
            frames: spots.iter().map(|s| s.diagnostics).collect(),
            link,
        };

        let degraded = diagnostics.degraded_frames();
        if degraded > 0 {
            tracing::warn!(
                degraded,
                search_radius = self.config.erosion_search_radius,
                "Some frames had foreground beyond the erosion search radius"
            );
        }
        tracing::info!(
            spots = diagnostics.total_spots(),
            created = link.created,
            discarded = link.discarded,
            "Kept {} trajectories",
            link.kept
        );

        Ok(TrackingResult {
            trajectories,
            diagnostics,
        })
    }

    /// Check the stack against the configuration and resolve the frame range.
    fn frame_range(&self, frames: &[Buffer2<f32>], mask: Option<&BitBuffer2>) -> Result<Range<usize>> {
        let Some(first) = frames.first() else {
            return Err(Error::NoFrames);
        };
        let (width, height) = (first.width(), first.height());

        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| !f.same_size(first))
        {
            return Err(Error::FrameDimensionMismatch {
                index,
                width,
                height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        if let Some(mask) = mask {
            if mask.width() != width || mask.height() != height {
                return Err(Error::MaskDimensionMismatch {
                    width,
                    height,
                    actual_width: mask.width(),
                    actual_height: mask.height(),
                });
            }
        }

        self.config.validate_for_frame(width, height)?;

        let num_frames = frames.len();
        let start = self.config.start_frame;
        if start >= num_frames {
            return Err(ConfigError::StartFrameOutOfRange { start, num_frames }.into());
        }
        let end = self
            .config
            .end_frame
            .map_or(num_frames - 1, |end| end.min(num_frames - 1));
        Ok(start..end + 1)
    }
}
