//! Synthetic frame generation for detection, refinement and tracking tests.

use std::f64::consts::PI;

use common::Buffer2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A symmetric 2-D Gaussian spot.
#[derive(Debug, Clone, Copy)]
pub struct Blob {
    pub x: f64,
    pub y: f64,
    pub sigma: f64,
    /// Peak value above background.
    pub amplitude: f64,
    /// Floor each rendered pixel value, like an integer camera.
    pub quantized: bool,
}

impl Blob {
    pub fn new(x: f64, y: f64, sigma: f64, amplitude: f64) -> Self {
        Self {
            x,
            y,
            sigma,
            amplitude,
            quantized: false,
        }
    }

    /// Blob with a given integrated intensity, rendered to integer counts.
    pub fn quantized(x: f64, y: f64, sigma: f64, total_intensity: f64) -> Self {
        Self {
            x,
            y,
            sigma,
            amplitude: total_intensity / (2.0 * PI * sigma * sigma),
            quantized: true,
        }
    }

    pub fn value(&self, px: f64, py: f64) -> f64 {
        let dx = px - self.x;
        let dy = py - self.y;
        let v = self.amplitude * (-(dx * dx + dy * dy) / (2.0 * self.sigma * self.sigma)).exp();
        if self.quantized {
            v.floor()
        } else {
            v
        }
    }
}

/// Render `blobs` on a flat background.
pub fn gaussian_frame(width: usize, height: usize, background: f32, blobs: &[Blob]) -> Buffer2<f32> {
    Buffer2::from_fn(width, height, |x, y| {
        let signal: f64 = blobs.iter().map(|b| b.value(x as f64, y as f64)).sum();
        background + signal as f32
    })
}

/// Add zero-mean Gaussian noise (Box-Muller) with a fixed seed.
pub fn add_noise(frame: &mut Buffer2<f32>, sigma: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for p in frame.pixels_mut() {
        let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = rng.random();
        let n = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        *p += (n * sigma) as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantized_blob_totals_close_to_request() {
        let frame = gaussian_frame(21, 21, 0.0, &[Blob::quantized(10.0, 10.0, 1.5, 5000.0)]);
        let total: f32 = frame.iter().sum();
        // flooring loses at most one count per lit pixel
        assert!(total <= 5000.0 && total > 4800.0, "total {total}");
        assert!(frame.iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn noise_is_seeded() {
        let mut a = Buffer2::new_filled(8, 8, 10.0f32);
        let mut b = a.clone();
        add_noise(&mut a, 2.0, 7);
        add_noise(&mut b, 2.0, 7);
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 10.0));
    }
}
