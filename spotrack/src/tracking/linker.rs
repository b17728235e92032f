//! Frame-sequential trajectory construction.
//!
//! A trajectory is *open* while it has a point in the most recently linked
//! frame. Once a frame passes without extending it, it is dormant for good
//! and never matched again.

use std::sync::Arc;

use glam::DVec2;

use super::matching::{GreedyMatching, MatchingStrategy};
use super::store::TrajectorySet;
use super::trajectory::{Trajectory, TrajectoryPoint};
use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::spot_detection::Candidate;

/// Trajectory counts at the end of linking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub created: usize,
    pub kept: usize,
    /// Shorter than `min_traj_len`.
    pub discarded: usize,
}

#[derive(Debug)]
pub struct TrajectoryLinker {
    config: LinkConfig,
    strategy: Arc<dyn MatchingStrategy>,
    /// Every trajectory in creation order; ids are arena indices until `finish`.
    trajectories: Vec<Trajectory>,
    /// Arena indices of the open trajectories.
    open: Vec<usize>,
    last_frame: Option<usize>,
}

impl TrajectoryLinker {
    /// Linker with the default greedy matching.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_strategy(config, Arc::new(GreedyMatching))
    }

    pub fn with_strategy(config: LinkConfig, strategy: Arc<dyn MatchingStrategy>) -> Self {
        Self {
            config,
            strategy,
            trajectories: Vec::new(),
            open: Vec::new(),
            last_frame: None,
        }
    }

    /// Trajectories created so far, open or dormant.
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    /// Link the next frame's candidates.
    ///
    /// Frames must arrive in increasing order. While any trajectory is open
    /// the next frame must directly follow the last one, otherwise this is a
    /// [`LinkingContractViolation`](crate::Error::LinkingContractViolation).
    /// A rejected frame leaves the linker unchanged.
    pub fn push_frame(&mut self, frame: usize, candidates: &[Candidate]) -> Result<()> {
        self.check_order(frame)?;

        let positions: Vec<DVec2> = candidates.iter().map(|c| c.pos).collect();
        let endpoints: Vec<DVec2> = self
            .open
            .iter()
            .map(|&t| self.trajectories[t].last().pos)
            .collect();

        let assignment =
            self.strategy
                .assign(&positions, &endpoints, self.config.max_displacement);

        let mut next_open = Vec::with_capacity(candidates.len());
        let mut extended = 0usize;
        for (candidate, matched) in candidates.iter().zip(assignment) {
            let point = TrajectoryPoint::from_candidate(frame, candidate);
            match matched {
                Some(endpoint) => {
                    let t = self.open[endpoint];
                    self.trajectories[t].extend(point)?;
                    next_open.push(t);
                    extended += 1;
                }
                None => {
                    let t = self.trajectories.len();
                    self.trajectories.push(Trajectory::new(t, point));
                    next_open.push(t);
                }
            }
        }

        tracing::debug!(
            frame,
            candidates = candidates.len(),
            extended,
            started = candidates.len() - extended,
            dormant = self.open.len() - extended,
            "Linked frame"
        );

        self.open = next_open;
        self.last_frame = Some(frame);
        Ok(())
    }

    fn check_order(&self, frame: usize) -> Result<()> {
        let Some(last) = self.last_frame else {
            return Ok(());
        };
        if let Some(&first_open) = self.open.first() {
            if frame != last + 1 {
                return Err(Error::LinkingContractViolation {
                    trajectory: self.trajectories[first_open].id(),
                    end_frame: last,
                    frame,
                });
            }
        } else if frame <= last {
            return Err(Error::FrameOutOfOrder { previous: last, frame });
        }
        Ok(())
    }

    /// Drop short trajectories and renumber the rest densely from
    /// [`TRAJECTORY_ID_BASE`](crate::TRAJECTORY_ID_BASE) in creation order.
    pub fn finish(self) -> (TrajectorySet, LinkStats) {
        let created = self.trajectories.len();
        let kept: Vec<Trajectory> = self
            .trajectories
            .into_iter()
            .filter(|t| t.len() >= self.config.min_traj_len)
            .collect();
        let stats = LinkStats {
            created,
            kept: kept.len(),
            discarded: created - kept.len(),
        };
        (TrajectorySet::renumbered(kept), stats)
    }
}
