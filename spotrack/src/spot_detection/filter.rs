//! SNR, mask and edge filtering of refined candidates.

use common::BitBuffer2;

use super::candidate::Candidate;
use crate::config::FilterConfig;

/// Rejection counts from one filtering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub low_snr: usize,
    pub outside_mask: usize,
    pub near_edge: usize,
}

impl FilterStats {
    pub fn total(&self) -> usize {
        self.low_snr + self.outside_mask + self.near_edge
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter {
    config: FilterConfig,
}

impl CandidateFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Drop candidates with `snr <= snr_cutoff` (or NaN), those on a zero
    /// mask pixel, and those within `halfwidth` of a frame edge. Survivors
    /// keep their order.
    ///
    /// Checks run in that order and each rejection is counted once.
    pub fn filter(
        &self,
        mut candidates: Vec<Candidate>,
        width: usize,
        height: usize,
        mask: Option<&BitBuffer2>,
    ) -> (Vec<Candidate>, FilterStats) {
        let mut stats = FilterStats::default();
        let hw = self.config.halfwidth as f64;
        let (w, h) = (width as f64, height as f64);

        candidates.retain(|c| {
            if !(c.snr > self.config.snr_cutoff) {
                stats.low_snr += 1;
                false
            } else if mask.is_some_and(|m| !on_mask(m, c)) {
                stats.outside_mask += 1;
                false
            } else if c.pos.x < hw || c.pos.x >= w - hw || c.pos.y < hw || c.pos.y >= h - hw {
                stats.near_edge += 1;
                false
            } else {
                true
            }
        });

        (candidates, stats)
    }
}

/// Mask pixel under the rounded position. Off-mask positions read as zero.
fn on_mask(mask: &BitBuffer2, candidate: &Candidate) -> bool {
    match candidate.rounded_pixel() {
        Some((x, y)) => mask.get_signed(x as isize, y as isize),
        None => false,
    }
}
