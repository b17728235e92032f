//! Final spot intensity, measured on the filtered position.
//!
//! The `(2 * halfwidth + 1)^2` window around the rounded position is split
//! into the inner circle of `inner_mask_radius` and the ring outside it. The
//! intensity is the inner sum after subtracting the ring mean from every
//! inner pixel.

use common::Buffer2;

use super::candidate::Candidate;
use crate::config::ApertureConfig;

#[derive(Debug, Clone, Copy)]
pub struct IntensityMeter {
    config: ApertureConfig,
}

impl IntensityMeter {
    pub fn new(config: ApertureConfig) -> Self {
        Self { config }
    }

    /// Re-measure every candidate. Candidates whose window leaves the frame
    /// keep their refinement intensity.
    pub fn measure_all(&self, frame: &Buffer2<f32>, candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .map(|&c| match self.measure(frame, &c) {
                Some(intensity) => c.with_intensity(intensity),
                None => c,
            })
            .collect()
    }

    pub fn measure(&self, frame: &Buffer2<f32>, candidate: &Candidate) -> Option<f64> {
        let (cx, cy) = candidate.rounded_pixel()?;
        let r = self.config.halfwidth;
        let inner = self.config.inner_mask_radius;
        let background = window_background(frame, cx, cy, r, inner)?;

        let inner_sq = (inner * inner) as isize;
        let mut sum = 0.0;
        let mut count = 0usize;
        for_window(cx, cy, r, |x, y, d2| {
            if d2 <= inner_sq {
                sum += *frame.get(x, y) as f64;
                count += 1;
            }
        });
        let intensity = sum - background * count as f64;
        if intensity == 0.0 {
            tracing::warn!(x = cx, y = cy, "Zero spot intensity");
        }
        Some(intensity)
    }
}

/// Mean of the window pixels outside the inner circle.
///
/// `None` when the window around `(cx, cy)` does not fit in the frame.
pub(crate) fn window_background(
    frame: &Buffer2<f32>,
    cx: usize,
    cy: usize,
    halfwidth: usize,
    inner_mask_radius: usize,
) -> Option<f64> {
    let r = halfwidth;
    if cx < r || cy < r || cx + r >= frame.width() || cy + r >= frame.height() {
        return None;
    }

    let inner_sq = (inner_mask_radius * inner_mask_radius) as isize;
    let mut sum = 0.0;
    let mut count = 0usize;
    for_window(cx, cy, r, |x, y, d2| {
        if d2 > inner_sq {
            sum += *frame.get(x, y) as f64;
            count += 1;
        }
    });
    Some(sum / count.max(1) as f64)
}

/// Visit every pixel of a window that is known to fit, with its squared
/// distance from the centre.
fn for_window(cx: usize, cy: usize, r: usize, mut f: impl FnMut(usize, usize, isize)) {
    let r = r as isize;
    for dy in -r..=r {
        for dx in -r..=r {
            let x = (cx as isize + dx) as usize;
            let y = (cy as isize + dy) as usize;
            f(x, y, dx * dx + dy * dy);
        }
    }
}
