//! Top-hat binarization chain.
//!
//! 1. Optional 3x3 Gaussian pre-blur
//! 2. White top-hat with an elliptical disk of diameter `2 * radius - 1`
//! 3. Threshold from the dominant peak of the 256-bin top-hat histogram
//! 4. 3x3 blur of the top-hat image, then binary threshold
//! 5. Opening with a 3x3 cross, closing with a 3x3 cross

use common::{BitBuffer2, Buffer2};

use super::morphology::{close_binary, gaussian_blur_3x3, open_binary, top_hat, Kernel};
use super::Binarizer;

const HISTOGRAM_BINS: usize = 256;

#[derive(Debug, Clone)]
pub struct TopHatBinarizer {
    disk: Kernel,
    tolerance: f64,
    prefilter: bool,
}

impl TopHatBinarizer {
    pub fn new(structuring_radius: usize, tolerance: f64, prefilter: bool) -> Self {
        let size = (2 * structuring_radius).saturating_sub(1).max(1);
        Self {
            disk: Kernel::ellipse(size),
            tolerance,
            prefilter,
        }
    }

    /// Background-suppressed frame.
    pub fn top_hat(&self, frame: &Buffer2<f32>) -> Buffer2<f32> {
        if self.prefilter {
            top_hat(&gaussian_blur_3x3(frame), &self.disk)
        } else {
            top_hat(frame, &self.disk)
        }
    }
}

impl Binarizer for TopHatBinarizer {
    fn binarize(&self, frame: &Buffer2<f32>) -> Option<BitBuffer2> {
        if frame.is_empty() {
            return None;
        }
        let tophat = self.top_hat(frame);
        let histogram = histogram(&tophat);
        let (peak, width) = histogram_peak(&histogram)?;
        let threshold = (peak as f64 + self.tolerance * width).trunc();
        if !threshold.is_finite() {
            return None;
        }

        let smoothed = gaussian_blur_3x3(&tophat);
        let bw = BitBuffer2::from_fn(frame.width(), frame.height(), |x, y| {
            *smoothed.get(x, y) as f64 > threshold
        });
        let opened = open_binary(&bw, &Kernel::cross());
        Some(close_binary(&opened, &Kernel::cross()))
    }
}

/// Unit-width bins over `[0, 256)`. Bin 0 is cleared so the flat background
/// left by the top-hat does not dominate.
fn histogram(image: &Buffer2<f32>) -> [u64; HISTOGRAM_BINS] {
    let mut hist = [0u64; HISTOGRAM_BINS];
    for &v in image.iter() {
        if (0.0..HISTOGRAM_BINS as f32).contains(&v) {
            hist[v as usize] += 1;
        }
    }
    hist[0] = 0;
    hist
}

/// Position and full width at half maximum of the tallest histogram peak.
///
/// The leading edge is the first half-maximum crossing from the low end, the
/// trailing edge the first crossing after the peak; both are linearly
/// interpolated. A peak with no trailing crossing has width 0. `None` for an
/// empty histogram.
fn histogram_peak(hist: &[u64; HISTOGRAM_BINS]) -> Option<(usize, f64)> {
    let max = hist.iter().copied().max().filter(|&m| m > 0)? as f64;
    let data: Vec<f64> = hist.iter().map(|&c| c as f64 / max).collect();
    let n = data.len() - 1;
    let half = 0.5;

    // first index of the maximum
    let peak = data
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > data[best] { i } else { best })
        .min(n - 1);

    let crosses = |i: usize| (data[i] - half).signum() != (data[i - 1] - half).signum();
    let interpolate = |i: usize| (i - 1) as f64 + (half - data[i - 1]) / (data[i] - data[i - 1]);

    let mut i = 1;
    while !crosses(i) && i < n {
        i += 1;
    }
    let lead = interpolate(i);

    let mut i = peak + 1;
    while !crosses(i) && i < n {
        i += 1;
    }
    let width = if i != n { interpolate(i) - lead } else { 0.0 };

    Some((peak, width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_ignores_out_of_range_and_zero_bin() {
        let image = Buffer2::new(5, 1, vec![0.0f32, 0.5, 3.7, 255.9, 300.0]);
        let hist = histogram(&image);
        assert_eq!(hist[0], 0);
        assert_eq!(hist[3], 1);
        assert_eq!(hist[255], 1);
        assert_eq!(hist.iter().sum::<u64>(), 2);
    }

    #[test]
    fn triangular_peak_width() {
        let mut hist = [0u64; HISTOGRAM_BINS];
        // counts 0, 5, 10, 5, 0 centered on bin 10
        hist[9] = 5;
        hist[10] = 10;
        hist[11] = 5;
        let (peak, width) = histogram_peak(&hist).unwrap();
        assert_eq!(peak, 10);
        // half max is reached exactly at bins 9 and 11
        assert!((width - 2.0).abs() < 1e-12, "width {width}");
    }

    #[test]
    fn empty_histogram_has_no_peak() {
        assert!(histogram_peak(&[0u64; HISTOGRAM_BINS]).is_none());
    }

    #[test]
    fn isolated_spot_survives_chain() {
        // Checkerboard background (top-hat 0/1) with one bright 5x5 block.
        let mut frame = Buffer2::from_fn(32, 32, |x, y| 50.0 + ((x + y) % 2) as f32);
        for dy in 0..5 {
            for dx in 0..5 {
                frame[(14 + dx, 14 + dy)] = 200.0;
            }
        }
        let binarizer = TopHatBinarizer::new(4, 1.0, false);
        assert_eq!(binarizer.top_hat(&frame)[(16, 16)], 150.0);

        let mask = binarizer.binarize(&frame).unwrap();
        assert!(mask.get(16, 16));
        assert!(mask.get(14, 14));
        assert!(!mask.get(2, 2));
        assert!(!mask.get(28, 5));
    }

    #[test]
    fn flat_frame_is_unavailable() {
        let frame = Buffer2::new_filled(16, 16, 40.0f32);
        assert!(TopHatBinarizer::new(3, 1.0, false).binarize(&frame).is_none());
    }
}
