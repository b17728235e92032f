//! Foreground/background segmentation feeding the spot detector.
//!
//! The detector only needs a binary map of the same size as the frame.
//! [`Binarizer`] is the seam; [`ThresholdBinarizer`] and [`TopHatBinarizer`]
//! are the stock implementations.

pub mod morphology;
mod top_hat;

use common::{BitBuffer2, Buffer2};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::config::DetectConfig;

pub use top_hat::TopHatBinarizer;

/// Produces a foreground mask for one frame.
///
/// Returning `None` means binarization is unavailable for this frame. The
/// detector then reports no candidates.
pub trait Binarizer: Send + Sync {
    fn binarize(&self, frame: &Buffer2<f32>) -> Option<BitBuffer2>;
}

/// Stock binarizer selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Binarization {
    /// Global threshold at median plus a multiple of the robust sigma.
    Threshold,
    /// Top-hat background suppression with a histogram-derived threshold.
    #[default]
    TopHat,
}

impl Binarization {
    pub fn build(self, config: &DetectConfig) -> Box<dyn Binarizer> {
        match self {
            Binarization::Threshold => Box::new(ThresholdBinarizer::new(config.threshold_offset)),
            Binarization::TopHat => Box::new(TopHatBinarizer::new(
                config.structuring_radius,
                config.threshold_offset,
                config.gaussian_prefilter,
            )),
        }
    }
}

/// Scale from MAD to the standard deviation of a normal distribution.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Foreground where `value > median + offset * sigma`, sigma estimated from the MAD.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdBinarizer {
    offset: f64,
}

impl ThresholdBinarizer {
    pub fn new(offset: f64) -> Self {
        Self { offset }
    }

    /// Threshold that would be applied to `frame`.
    pub fn threshold(&self, frame: &Buffer2<f32>) -> Option<f64> {
        let (median, mad) = median_and_mad(frame.pixels())?;
        let threshold = median + self.offset * MAD_TO_SIGMA * mad;
        threshold.is_finite().then_some(threshold)
    }
}

impl Binarizer for ThresholdBinarizer {
    fn binarize(&self, frame: &Buffer2<f32>) -> Option<BitBuffer2> {
        let threshold = self.threshold(frame)?;
        Some(BitBuffer2::from_fn(frame.width(), frame.height(), |x, y| {
            *frame.get(x, y) as f64 > threshold
        }))
    }
}

/// Median and median absolute deviation. `None` for empty input.
fn median_and_mad(values: &[f32]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut scratch: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    let median = median_mut(&mut scratch);
    for v in scratch.iter_mut() {
        *v = (*v - median).abs();
    }
    let mad = median_mut(&mut scratch);
    Some((median, mad))
}

fn median_mut(values: &mut [f64]) -> f64 {
    let n = values.len();
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lower_max + upper)
    }
}
