//! A frame-contiguous track of one particle.

use glam::DVec2;

use crate::error::{Error, Result};
use crate::spot_detection::Candidate;

/// One frame of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub frame: usize,
    pub pos: DVec2,
    pub intensity: f64,
    pub background: f64,
    pub snr: f64,
    pub converged: bool,
    pub width: Option<DVec2>,
}

impl TrajectoryPoint {
    pub fn from_candidate(frame: usize, candidate: &Candidate) -> Self {
        Self {
            frame,
            pos: candidate.pos,
            intensity: candidate.intensity,
            background: candidate.background,
            snr: candidate.snr,
            converged: candidate.converged,
            width: candidate.width,
        }
    }
}

/// Entries are in strictly increasing, gap-free frame order. Every trajectory
/// has at least one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    id: usize,
    points: Vec<TrajectoryPoint>,
    /// Set by downstream analysis, never by tracking.
    pub stoichiometry: Option<f64>,
}

impl Trajectory {
    pub fn new(id: usize, first: TrajectoryPoint) -> Self {
        Self {
            id,
            points: vec![first],
            stoichiometry: None,
        }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    #[inline]
    pub fn start_frame(&self) -> usize {
        self.points[0].frame
    }

    /// Last frame (inclusive).
    #[inline]
    pub fn end_frame(&self) -> usize {
        self.start_frame() + self.points.len() - 1
    }

    /// Number of frames, `end_frame - start_frame + 1`.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    #[inline]
    pub fn last(&self) -> &TrajectoryPoint {
        &self.points[self.points.len() - 1]
    }

    /// Append the next frame. Any frame other than `end_frame + 1` is a
    /// contract violation and leaves the trajectory untouched.
    pub fn extend(&mut self, point: TrajectoryPoint) -> Result<()> {
        let end_frame = self.end_frame();
        if point.frame != end_frame + 1 {
            return Err(Error::LinkingContractViolation {
                trajectory: self.id,
                end_frame,
                frame: point.frame,
            });
        }
        self.points.push(point);
        Ok(())
    }

    pub fn mean_intensity(&self) -> f64 {
        self.points.iter().map(|p| p.intensity).sum::<f64>() / self.points.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(frame: usize, x: f64) -> TrajectoryPoint {
        TrajectoryPoint::from_candidate(frame, &Candidate::at(DVec2::new(x, 1.0)))
    }

    #[test]
    fn extends_contiguously() {
        let mut t = Trajectory::new(0, point(4, 1.0));
        t.extend(point(5, 2.0)).unwrap();
        t.extend(point(6, 3.0)).unwrap();
        assert_eq!(t.start_frame(), 4);
        assert_eq!(t.end_frame(), 6);
        assert_eq!(t.len(), 3);
        assert_eq!(t.last().pos.x, 3.0);
    }

    #[test]
    fn gap_is_contract_violation() {
        let mut t = Trajectory::new(9, point(4, 1.0));
        t.extend(point(5, 1.0)).unwrap();
        let err = t.extend(point(7, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::LinkingContractViolation {
                trajectory: 9,
                end_frame: 5,
                frame: 7
            }
        ));
        assert_eq!(t.end_frame(), 5);
    }

    #[test]
    fn same_or_earlier_frame_is_rejected() {
        let mut t = Trajectory::new(0, point(4, 1.0));
        assert!(t.extend(point(4, 1.0)).is_err());
        assert!(t.extend(point(3, 1.0)).is_err());
    }

    #[test]
    fn mean_intensity_over_points() {
        let c = |i| Candidate::at(DVec2::ZERO).with_refinement(DVec2::ZERO, 0.0, i, 1.0, true);
        let mut t = Trajectory::new(0, TrajectoryPoint::from_candidate(0, &c(10.0)));
        t.extend(TrajectoryPoint::from_candidate(1, &c(20.0))).unwrap();
        assert_eq!(t.mean_intensity(), 15.0);
    }
}
