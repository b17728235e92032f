//! Spot width estimation by 2-D Gaussian fitting.
//!
//! The `(2 * halfwidth + 1)^2` window around the rounded spot position is
//! background-subtracted (mean outside the inner circle) and fitted with
//!
//! f(x, y) = A * exp(-((x - x0)^2 / 2 sx^2 + (y - y0)^2 / 2 sy^2))
//!
//! The fitted `(sx, sy)` becomes the spot width. Failed or non-converged fits
//! report the nominal PSF width on both axes.

mod linear_solver;
mod lm_optimizer;

use common::Buffer2;
use glam::DVec2;

use self::lm_optimizer::{optimize, LMConfig, LMModel, Samples};
use super::candidate::Candidate;
use super::intensity::window_background;
use crate::config::WidthConfig;

/// Fitted sigma never goes below this.
const MIN_SIGMA: f64 = 0.3;

/// Gaussian without offset. Parameters: `[amplitude, x0, y0, sigma_x, sigma_y]`.
struct Gaussian2D {
    max_sigma: f64,
    max_pos: f64,
}

impl LMModel<5> for Gaussian2D {
    #[inline]
    fn evaluate(&self, x: f64, y: f64, params: &[f64; 5]) -> f64 {
        let [amp, x0, y0, sx, sy] = *params;
        let dx = x - x0;
        let dy = y - y0;
        amp * (-0.5 * (dx * dx / (sx * sx) + dy * dy / (sy * sy))).exp()
    }

    #[inline]
    fn jacobian_row(&self, x: f64, y: f64, params: &[f64; 5]) -> [f64; 5] {
        let [amp, x0, y0, sx, sy] = *params;
        let sx2 = sx * sx;
        let sy2 = sy * sy;
        let dx = x - x0;
        let dy = y - y0;
        let e = (-0.5 * (dx * dx / sx2 + dy * dy / sy2)).exp();
        let ae = amp * e;
        [
            e,
            ae * dx / sx2,
            ae * dy / sy2,
            ae * dx * dx / (sx2 * sx),
            ae * dy * dy / (sy2 * sy),
        ]
    }

    #[inline]
    fn constrain(&self, params: &mut [f64; 5]) {
        params[0] = params[0].max(1e-6);
        params[1] = params[1].clamp(0.0, self.max_pos);
        params[2] = params[2].clamp(0.0, self.max_pos);
        params[3] = params[3].clamp(MIN_SIGMA, self.max_sigma);
        params[4] = params[4].clamp(MIN_SIGMA, self.max_sigma);
    }
}

#[derive(Debug, Clone)]
pub struct WidthEstimator {
    config: WidthConfig,
    lm: LMConfig,
}

impl WidthEstimator {
    pub fn new(config: WidthConfig) -> Self {
        Self {
            config,
            lm: LMConfig::default(),
        }
    }

    pub fn estimate_all(&self, frame: &Buffer2<f32>, candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .map(|&c| c.with_width(self.estimate(frame, &c)))
            .collect()
    }

    /// Fitted `(sigma_x, sigma_y)`, or `(psf_width, psf_width)` when the fit
    /// fails or does not converge.
    pub fn estimate(&self, frame: &Buffer2<f32>, candidate: &Candidate) -> DVec2 {
        let fallback = DVec2::splat(self.config.psf_width);
        match self.fit(frame, candidate) {
            Some(width) => width,
            None => {
                tracing::debug!(
                    x = candidate.pos.x,
                    y = candidate.pos.y,
                    "Width fit failed, using PSF width"
                );
                fallback
            }
        }
    }

    fn fit(&self, frame: &Buffer2<f32>, candidate: &Candidate) -> Option<DVec2> {
        let r = self.config.halfwidth;
        let size = 2 * r + 1;
        let (cx, cy) = candidate.rounded_pixel()?;
        let background = window_background(frame, cx, cy, r, self.config.inner_mask_radius)?;

        let mut samples = Samples::default();
        let mut peak = f64::NEG_INFINITY;
        for sy in 0..size {
            let row = frame.row(cy - r + sy);
            for sx in 0..size {
                let v = row[cx - r + sx] as f64 - background;
                peak = peak.max(v);
                samples.push(sx as f64, sy as f64, v);
            }
        }
        if !(peak > 0.0) {
            return None;
        }

        let model = Gaussian2D {
            max_sigma: r as f64,
            max_pos: (size - 1) as f64,
        };
        let psf = self.config.psf_width.clamp(MIN_SIGMA, r as f64);
        let initial = [peak, r as f64, r as f64, psf, psf];
        let result = optimize(&model, &samples, initial, &self.lm);

        let [amp, _, _, sx, sy] = result.params;
        let pinned = |s: f64| s <= MIN_SIGMA || s >= model.max_sigma;
        let usable = result.converged
            && result.params.iter().all(|p| p.is_finite())
            && amp > 0.0
            && !pinned(sx)
            && !pinned(sy);
        usable.then(|| DVec2::new(sx, sy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic::{add_noise, gaussian_frame, Blob};

    fn estimator() -> WidthEstimator {
        WidthEstimator::new(WidthConfig {
            halfwidth: 8,
            inner_mask_radius: 5,
            psf_width: 1.33,
        })
    }

    #[test]
    fn recovers_sigma_of_clean_blob() {
        let frame = gaussian_frame(41, 41, 100.0, &[Blob::new(20.0, 20.0, 1.6, 1000.0)]);
        let width = estimator().estimate(&frame, &Candidate::at_pixel(20, 20));
        assert!((width.x - 1.6).abs() < 0.01, "sx = {}", width.x);
        assert!((width.y - 1.6).abs() < 0.01, "sy = {}", width.y);
    }

    #[test]
    fn recovers_elongated_blob() {
        // sigma 2.0 along x, 1.0 along y
        let frame = Buffer2::from_fn(41, 41, |x, y| {
            let dx = x as f64 - 20.3;
            let dy = y as f64 - 19.8;
            (50.0 + 800.0 * (-(dx * dx / 8.0 + dy * dy / 2.0)).exp()) as f32
        });
        let width = estimator().estimate(&frame, &Candidate::at(DVec2::new(20.3, 19.8)));
        assert!((width.x - 2.0).abs() < 0.05, "sx = {}", width.x);
        assert!((width.y - 1.0).abs() < 0.05, "sy = {}", width.y);
    }

    #[test]
    fn noisy_blob_is_close() {
        let mut frame = gaussian_frame(41, 41, 300.0, &[Blob::new(20.0, 21.0, 1.4, 1500.0)]);
        add_noise(&mut frame, 4.0, 3);
        let width = estimator().estimate(&frame, &Candidate::at_pixel(20, 21));
        assert!((width.x - 1.4).abs() < 0.15);
        assert!((width.y - 1.4).abs() < 0.15);
    }

    #[test]
    fn flat_window_falls_back_to_psf_width() {
        let frame = Buffer2::new_filled(41, 41, 100.0f32);
        let width = estimator().estimate(&frame, &Candidate::at_pixel(20, 20));
        assert_eq!(width, DVec2::splat(1.33));
    }

    #[test]
    fn unconverged_fit_falls_back_to_psf_width() {
        let frame = Buffer2::from_fn(41, 41, |x, y| {
            let dx = x as f64 - 20.3;
            let dy = y as f64 - 19.8;
            (50.0 + 800.0 * (-(dx * dx / 8.0 + dy * dy / 2.0)).exp()) as f32
        });
        let candidate = Candidate::at(DVec2::new(20.3, 19.8));
        let mut capped = estimator();
        capped.lm.max_iterations = 1;

        assert_eq!(capped.estimate(&frame, &candidate), DVec2::splat(1.33));
        // the same window fits fine with the full iteration budget
        assert_ne!(estimator().estimate(&frame, &candidate), DVec2::splat(1.33));
    }

    #[test]
    fn window_outside_frame_falls_back() {
        let frame = gaussian_frame(41, 41, 100.0, &[Blob::new(3.0, 3.0, 1.5, 1000.0)]);
        let width = estimator().estimate(&frame, &Candidate::at_pixel(3, 3));
        assert_eq!(width, DVec2::splat(1.33));
    }

    #[test]
    fn estimate_all_sets_width_only() {
        let frame = gaussian_frame(41, 41, 100.0, &[Blob::new(20.0, 20.0, 1.6, 1000.0)]);
        let c = Candidate::at_pixel(20, 20).with_refinement(DVec2::new(20.0, 20.0), 100.0, 5.0, 9.0, true);
        let out = estimator().estimate_all(&frame, &[c]);
        assert_eq!(out[0].intensity, 5.0);
        assert_eq!(out[0].snr, 9.0);
        assert!(out[0].width.is_some());
    }
}
