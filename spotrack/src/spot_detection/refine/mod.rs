//! Gaussian-masked iterative centroid refinement.
//!
//! Each iteration, relative to the current estimate `p`:
//!
//! 1. Inner mask: sub-image pixels with `|x - p|^2 <= inner_radius^2`
//! 2. Gaussian mask: `exp(-|x - p|^2 / 2 sigma^2)`, normalized to sum 1
//! 3. Background: mean of the pixels outside the inner mask
//! 4. New estimate: centroid weighted by `(I - bg) * G`
//! 5. Intensity, background spread and SNR, using the inner mask and
//!    background of this iteration (built around `p`, not the new estimate)
//!
//! The sub-image stays fixed at the clamped starting pixel for the whole run.


use common::Buffer2;
use glam::DVec2;

use super::candidate::Candidate;
use crate::config::RefineConfig;

/// Estimates closer than this to the previous one count as converged.
pub const CONVERGENCE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct CentroidRefiner {
    config: RefineConfig,
}

/// Square window of the frame, in f64, with its top-left pixel.
struct SubImage {
    origin_x: usize,
    origin_y: usize,
    size: usize,
    pixels: Vec<f64>,
}

impl SubImage {
    fn extract(frame: &Buffer2<f32>, center_x: usize, center_y: usize, r: usize) -> Self {
        let size = 2 * r + 1;
        let origin_x = center_x - r;
        let origin_y = center_y - r;
        let mut pixels = Vec::with_capacity(size * size);
        for y in origin_y..origin_y + size {
            pixels.extend(frame.row(y)[origin_x..origin_x + size].iter().map(|&v| v as f64));
        }
        Self {
            origin_x,
            origin_y,
            size,
            pixels,
        }
    }

    /// Absolute frame coordinates and value of every pixel.
    fn iter(&self) -> impl Iterator<Item = (DVec2, f64)> + '_ {
        self.pixels.iter().enumerate().map(move |(i, &v)| {
            let x = (self.origin_x + i % self.size) as f64;
            let y = (self.origin_y + i / self.size) as f64;
            (DVec2::new(x, y), v)
        })
    }
}

impl CentroidRefiner {
    pub fn new(config: RefineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    pub fn refine_all(&self, frame: &Buffer2<f32>, candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .map(|&candidate| self.refine(frame, candidate))
            .collect()
    }

    /// Refine one candidate.
    ///
    /// Never fails. A candidate whose estimate goes non-finite keeps its last
    /// finite position and is reported unconverged. A frame smaller than the
    /// sub-image returns the candidate unchanged and unconverged.
    pub fn refine(&self, frame: &Buffer2<f32>, candidate: Candidate) -> Candidate {
        let r = self.config.halfwidth;
        let size = 2 * r + 1;
        if frame.width() < size || frame.height() < size {
            return candidate.with_refinement(candidate.pos, 0.0, 0.0, 0.0, false);
        }

        let mut p = DVec2::new(
            clamp_axis(candidate.pos.x, r, frame.width()),
            clamp_axis(candidate.pos.y, r, frame.height()),
        );
        let sub = SubImage::extract(
            frame,
            p.x.round_ties_even() as usize,
            p.y.round_ties_even() as usize,
            r,
        );

        let inner_sq = (self.config.inner_mask_radius * self.config.inner_mask_radius) as f64;
        let two_sigma_sq = 2.0 * self.config.gauss_mask_sigma * self.config.gauss_mask_sigma;

        let mut inner = vec![false; sub.pixels.len()];
        let mut gauss = vec![0.0f64; sub.pixels.len()];

        let mut converged = false;
        let mut background = 0.0;
        let mut intensity = 0.0;
        let mut snr = 0.0;

        for _ in 0..self.config.max_iterations {
            let mut inner_count = 0usize;
            let mut gauss_sum = 0.0;
            let mut bg_sum = 0.0;
            for (i, (xy, v)) in sub.iter().enumerate() {
                let d_sq = xy.distance_squared(p);
                inner[i] = d_sq <= inner_sq;
                gauss[i] = (-d_sq / two_sigma_sq).exp();
                gauss_sum += gauss[i];
                if inner[i] {
                    inner_count += 1;
                } else {
                    bg_sum += v;
                }
            }
            if gauss_sum != 0.0 {
                gauss.iter_mut().for_each(|g| *g /= gauss_sum);
            }
            let bg_count = sub.pixels.len() - inner_count;
            background = bg_sum / bg_count as f64;

            let mut weight_sum = 0.0;
            let mut weighted = DVec2::ZERO;
            for (i, (xy, v)) in sub.iter().enumerate() {
                let w = (v - background) * gauss[i];
                weight_sum += w;
                weighted += xy * w;
            }
            let p_new = weighted / weight_sum;
            let change = p.distance(p_new);

            if !p_new.is_finite() {
                tracing::debug!(x = p.x, y = p.y, "Centroid estimate is not finite, giving up");
                converged = false;
                break;
            }
            p = p_new;

            let mut bg_sq_sum = 0.0;
            intensity = 0.0;
            for (i, &v) in sub.pixels.iter().enumerate() {
                if inner[i] {
                    intensity += v - background;
                } else {
                    bg_sq_sum += (v - background) * (v - background);
                }
            }
            let bg_std = (bg_sq_sum / bg_count as f64).sqrt();

            if change < CONVERGENCE_EPSILON {
                converged = true;
            }

            snr = (intensity / (bg_std * inner_count as f64)).abs();
            if snr <= self.config.snr_cutoff || converged {
                break;
            }
        }

        candidate.with_refinement(p, background, intensity, snr, converged)
    }
}

/// Keep the rounded coordinate within `[r, len - r - 1]`.
fn clamp_axis(v: f64, r: usize, len: usize) -> f64 {
    let rounded = v.round_ties_even();
    let low = r as f64;
    let high = (len - r - 1) as f64;
    if rounded < low || v.is_nan() {
        low
    } else if rounded > high {
        high
    } else {
        v
    }
}
