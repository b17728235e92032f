//! Raw candidate detection for one frame.

use common::{BitBuffer2, Buffer2};

use super::binarize::Binarizer;
use super::candidate::Candidate;
use super::distance_map::DistanceMap;
use super::erosion::{erosion_depth, local_maxima};
use crate::config::DetectConfig;

/// Raw candidates of one frame plus detection health.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Integer positions in row-major order.
    pub candidates: Vec<Candidate>,
    /// Pixels whose erosion search found no background.
    pub unresolved_pixels: usize,
    /// Foreground pixels in the binarized frame.
    pub foreground_pixels: usize,
}

impl Detection {
    #[inline]
    pub fn degraded(&self) -> bool {
        self.unresolved_pixels > 0
    }
}

/// Binarizes a frame and picks the centers of its foreground blobs.
pub struct SpotDetector {
    config: DetectConfig,
    distance_map: DistanceMap,
    binarizer: Box<dyn Binarizer>,
}

impl std::fmt::Debug for SpotDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotDetector")
            .field("config", &self.config)
            .field("search_radius", &self.distance_map.radius())
            .finish_non_exhaustive()
    }
}

impl SpotDetector {
    /// Detector using the stock binarizer selected by `config.binarization`.
    pub fn new(config: DetectConfig) -> Self {
        let binarizer = config.binarization.build(&config);
        Self::with_binarizer(config, binarizer)
    }

    pub fn with_binarizer(config: DetectConfig, binarizer: Box<dyn Binarizer>) -> Self {
        Self {
            distance_map: DistanceMap::new(config.erosion_search_radius),
            config,
            binarizer,
        }
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Detect raw candidates in `frame`.
    ///
    /// Returns an empty detection when the structuring radius exceeds half the
    /// smaller frame dimension or the binarizer has nothing for this frame.
    pub fn detect(&self, frame: &Buffer2<f32>) -> Detection {
        let half_dim = frame.width().min(frame.height()) / 2;
        if self.config.structuring_radius > half_dim {
            tracing::warn!(
                structuring_radius = self.config.structuring_radius,
                width = frame.width(),
                height = frame.height(),
                "Structuring radius exceeds frame half-dimension, skipping detection"
            );
            return Detection::default();
        }

        let Some(foreground) = self.binarizer.binarize(frame) else {
            tracing::debug!("Binarization unavailable for frame, no candidates");
            return Detection::default();
        };

        if foreground.width() != frame.width() || foreground.height() != frame.height() {
            tracing::warn!(
                mask_width = foreground.width(),
                mask_height = foreground.height(),
                width = frame.width(),
                height = frame.height(),
                "Binarizer returned a mask of the wrong size, no candidates"
            );
            return Detection::default();
        }

        self.detect_in_mask(&foreground)
    }

    /// Ultimate erosion and local maxima on an already binarized frame.
    pub fn detect_in_mask(&self, foreground: &BitBuffer2) -> Detection {
        let foreground_pixels = foreground.count_ones();
        if foreground_pixels == 0 {
            return Detection::default();
        }

        let scored = erosion_depth(foreground, &self.distance_map);
        if scored.unresolved > 0 {
            tracing::warn!(
                unresolved = scored.unresolved,
                search_radius = self.distance_map.radius(),
                "Erosion search radius exhausted, detection degraded"
            );
        }

        Detection {
            candidates: local_maxima(&scored.depth),
            unresolved_pixels: scored.unresolved,
            foreground_pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spot_detection::Binarization;
    use crate::testing::synthetic::{gaussian_frame, Blob};

    fn config(binarization: Binarization) -> DetectConfig {
        DetectConfig {
            structuring_radius: 3,
            threshold_offset: 1.0,
            binarization,
            gaussian_prefilter: false,
            erosion_search_radius: 16,
        }
    }

    struct Fixed(Option<BitBuffer2>);

    impl Binarizer for Fixed {
        fn binarize(&self, _frame: &Buffer2<f32>) -> Option<BitBuffer2> {
            self.0.clone()
        }
    }

    #[test]
    fn empty_foreground_gives_no_candidates() {
        let frame = Buffer2::new_filled(20, 20, 0.0f32);
        let detector = SpotDetector::new(config(Binarization::Threshold));
        let detection = detector.detect(&frame);
        assert!(detection.candidates.is_empty());
        assert!(!detection.degraded());
    }

    #[test]
    fn single_blob_gives_one_candidate_at_peak() {
        let frame = gaussian_frame(10, 10, 0.0, &[Blob::quantized(5.0, 5.0, 1.0, 5000.0)]);
        let detection = SpotDetector::new(config(Binarization::Threshold)).detect(&frame);
        assert_eq!(detection.candidates.len(), 1);
        assert_eq!(detection.candidates[0].pos, glam::DVec2::new(5.0, 5.0));
    }

    #[test]
    fn two_separate_blobs() {
        let frame = gaussian_frame(
            40,
            30,
            0.0,
            &[
                Blob::quantized(10.0, 12.0, 1.0, 5000.0),
                Blob::quantized(28.0, 15.0, 1.0, 5000.0),
            ],
        );
        let detection = SpotDetector::new(config(Binarization::Threshold)).detect(&frame);
        let positions: Vec<_> = detection.candidates.iter().map(|c| c.pos).collect();
        assert_eq!(
            positions,
            vec![glam::DVec2::new(10.0, 12.0), glam::DVec2::new(28.0, 15.0)]
        );
    }

    #[test]
    fn oversized_structuring_radius_gives_empty_set() {
        let frame = gaussian_frame(10, 10, 0.0, &[Blob::quantized(5.0, 5.0, 1.0, 5000.0)]);
        let detector = SpotDetector::new(DetectConfig {
            structuring_radius: 6,
            ..config(Binarization::Threshold)
        });
        assert!(detector.detect(&frame).candidates.is_empty());
    }

    #[test]
    fn unavailable_binarizer_gives_empty_set() {
        let frame = Buffer2::new_filled(10, 10, 1.0f32);
        let detector =
            SpotDetector::with_binarizer(config(Binarization::Threshold), Box::new(Fixed(None)));
        assert!(detector.detect(&frame).candidates.is_empty());
    }

    #[test]
    fn wrong_size_mask_gives_empty_set() {
        let frame = Buffer2::new_filled(10, 10, 1.0f32);
        let detector = SpotDetector::with_binarizer(
            config(Binarization::Threshold),
            Box::new(Fixed(Some(BitBuffer2::new_filled(8, 8, true)))),
        );
        assert!(detector.detect(&frame).candidates.is_empty());
    }

    #[test]
    fn large_foreground_is_degraded_not_fatal() {
        let frame = Buffer2::new_filled(12, 12, 1.0f32);
        let mut mask = BitBuffer2::new_filled(12, 12, true);
        mask.set(0, 0, false);
        let detector = SpotDetector::with_binarizer(
            DetectConfig {
                erosion_search_radius: 2,
                ..config(Binarization::Threshold)
            },
            Box::new(Fixed(Some(mask))),
        );
        let detection = detector.detect(&frame);
        assert!(detection.degraded());
        assert!(detection.unresolved_pixels > 0);
        assert_eq!(detection.foreground_pixels, 143);
    }
}
