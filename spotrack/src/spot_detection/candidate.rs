//! Candidate spot type.

use glam::DVec2;

/// One detected spot within a single frame.
///
/// Stages never mutate a candidate in place. Each stage builds a new value
/// from the previous one with the `with_*` constructors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Sub-pixel position, `x` = column, `y` = row.
    pub pos: DVec2,
    /// Mean background intensity around the spot.
    pub background: f64,
    /// Background-subtracted intensity summed under the inner mask.
    pub intensity: f64,
    /// Gaussian sigma along x and y, when estimated.
    pub width: Option<DVec2>,
    pub snr: f64,
    /// Whether centroid refinement reached its stability criterion.
    pub converged: bool,
}

impl Candidate {
    /// Raw candidate at a detected position, no measurements yet.
    pub fn at(pos: DVec2) -> Self {
        Self {
            pos,
            background: 0.0,
            intensity: 0.0,
            width: None,
            snr: 0.0,
            converged: false,
        }
    }

    /// Raw candidate at an integer pixel.
    pub fn at_pixel(x: usize, y: usize) -> Self {
        Self::at(DVec2::new(x as f64, y as f64))
    }

    /// Copy with refinement results applied.
    pub fn with_refinement(
        self,
        pos: DVec2,
        background: f64,
        intensity: f64,
        snr: f64,
        converged: bool,
    ) -> Self {
        Self {
            pos,
            background,
            intensity,
            snr,
            converged,
            ..self
        }
    }

    /// Copy with a re-measured intensity.
    pub fn with_intensity(self, intensity: f64) -> Self {
        Self { intensity, ..self }
    }

    /// Copy with an estimated width.
    pub fn with_width(self, width: DVec2) -> Self {
        Self {
            width: Some(width),
            ..self
        }
    }

    /// Position rounded half-to-even, as pixel indices `(col, row)`.
    ///
    /// `None` when the rounded position is negative or non-finite.
    pub fn rounded_pixel(&self) -> Option<(usize, usize)> {
        let x = self.pos.x.round_ties_even();
        let y = self.pos.y.round_ties_even();
        if x.is_finite() && y.is_finite() && x >= 0.0 && y >= 0.0 {
            Some((x as usize, y as usize))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_refinement_keeps_width() {
        let c = Candidate::at_pixel(3, 4).with_width(DVec2::new(1.0, 2.0));
        let refined = c.with_refinement(DVec2::new(3.2, 4.1), 10.0, 500.0, 3.0, true);
        assert_eq!(refined.width, Some(DVec2::new(1.0, 2.0)));
        assert_eq!(refined.pos, DVec2::new(3.2, 4.1));
        assert!(refined.converged);
        // original untouched
        assert_eq!(c.pos, DVec2::new(3.0, 4.0));
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(Candidate::at(DVec2::new(2.5, 3.5)).rounded_pixel(), Some((2, 4)));
        assert_eq!(Candidate::at(DVec2::new(0.4, 7.6)).rounded_pixel(), Some((0, 8)));
        assert_eq!(Candidate::at(DVec2::new(-0.6, 1.0)).rounded_pixel(), None);
        assert_eq!(Candidate::at(DVec2::new(f64::NAN, 1.0)).rounded_pixel(), None);
    }
}
