//! Per-frame spot localization.
//!
//! [`SpotLocator`] chains the frame stages:
//! detection → merging → centroid refinement → filtering → intensity
//! measurement → width estimation.
//! Every stage is independent of other frames.

mod binarize;
mod candidate;
mod detector;
mod distance_map;
mod erosion;
mod filter;
mod intensity;
mod merge;
mod refine;
mod width;

use common::{BitBuffer2, Buffer2};

use crate::config::Config;

pub use binarize::morphology;
pub use binarize::{Binarization, Binarizer, ThresholdBinarizer, TopHatBinarizer};
pub use candidate::Candidate;
pub use detector::{Detection, SpotDetector};
pub use distance_map::{DistanceMap, Offset};
pub use erosion::{erosion_depth, local_maxima, ErosionDepth};
pub use filter::{CandidateFilter, FilterStats};
pub use intensity::IntensityMeter;
pub use merge::{CandidateMerger, MERGE_DISTANCE};
pub use refine::{CentroidRefiner, CONVERGENCE_EPSILON};
pub use width::WidthEstimator;

/// Counts from one frame's trip through the stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameDiagnostics {
    /// Raw local maxima found by the detector.
    pub identified: usize,
    /// Candidates left after merging near-duplicates.
    pub after_merge: usize,
    /// Candidates whose refinement did not converge.
    pub unconverged: usize,
    pub rejected: FilterStats,
    /// Candidates handed to the linker.
    pub final_count: usize,
    /// Foreground pixels whose erosion search found no background.
    pub unresolved_pixels: usize,
}

impl FrameDiagnostics {
    /// The erosion search radius was too small for some foreground.
    pub fn degraded(&self) -> bool {
        self.unresolved_pixels > 0
    }

    pub fn merged(&self) -> usize {
        self.identified - self.after_merge
    }
}

/// Finalized candidates of one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameSpots {
    /// Absolute frame index in the stack.
    pub frame: usize,
    pub candidates: Vec<Candidate>,
    pub diagnostics: FrameDiagnostics,
}

/// All frame stages, configured once and shared across workers.
#[derive(Debug)]
pub struct SpotLocator {
    detector: SpotDetector,
    merger: CandidateMerger,
    refiner: CentroidRefiner,
    filter: CandidateFilter,
    intensity: IntensityMeter,
    widths: Option<WidthEstimator>,
}

impl SpotLocator {
    pub fn new(config: &Config) -> Self {
        Self::with_detector(config, SpotDetector::new(config.detect()))
    }

    pub fn with_binarizer(config: &Config, binarizer: Box<dyn Binarizer>) -> Self {
        Self::with_detector(config, SpotDetector::with_binarizer(config.detect(), binarizer))
    }

    fn with_detector(config: &Config, detector: SpotDetector) -> Self {
        Self {
            detector,
            merger: CandidateMerger,
            refiner: CentroidRefiner::new(config.refine()),
            filter: CandidateFilter::new(config.filter()),
            intensity: IntensityMeter::new(config.aperture()),
            widths: config
                .estimate_widths
                .then(|| WidthEstimator::new(config.width())),
        }
    }

    /// Run every frame stage on one frame.
    pub fn locate(
        &self,
        frame_index: usize,
        frame: &Buffer2<f32>,
        mask: Option<&BitBuffer2>,
    ) -> FrameSpots {
        let detection = self.detector.detect(frame);
        let identified = detection.candidates.len();

        let merged = self.merger.merge(&detection.candidates);
        let after_merge = merged.len();

        let refined = self.refiner.refine_all(frame, &merged);
        let unconverged = refined.iter().filter(|c| !c.converged).count();
        if unconverged > 0 {
            tracing::debug!(
                frame = frame_index,
                unconverged,
                "Centroid refinement did not converge for some spots"
            );
        }

        let (kept, rejected) = self
            .filter
            .filter(refined, frame.width(), frame.height(), mask);

        let measured = self.intensity.measure_all(frame, &kept);
        let candidates = match &self.widths {
            Some(widths) => widths.estimate_all(frame, &measured),
            None => measured,
        };

        let diagnostics = FrameDiagnostics {
            identified,
            after_merge,
            unconverged,
            rejected,
            final_count: candidates.len(),
            unresolved_pixels: detection.unresolved_pixels,
        };

        tracing::info!(
            frame = frame_index,
            identified,
            merged = diagnostics.merged(),
            filtered = rejected.total(),
            "Found {} spots",
            candidates.len()
        );

        FrameSpots {
            frame: frame_index,
            candidates,
            diagnostics,
        }
    }
}
