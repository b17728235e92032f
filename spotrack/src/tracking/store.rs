//! Finished trajectories of a run.

use super::trajectory::{Trajectory, TrajectoryPoint};

/// First id handed out after linking.
pub const TRAJECTORY_ID_BASE: usize = 0;

/// One table row: a trajectory point tagged with its trajectory id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryRecord {
    pub trajectory: usize,
    pub point: TrajectoryPoint,
}

/// Trajectories ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectorySet {
    trajectories: Vec<Trajectory>,
}

impl TrajectorySet {
    /// Assign dense ids from [`TRAJECTORY_ID_BASE`] in the given order.
    pub fn renumbered(mut trajectories: Vec<Trajectory>) -> Self {
        for (i, t) in trajectories.iter_mut().enumerate() {
            t.set_id(TRAJECTORY_ID_BASE + i);
        }
        Self { trajectories }
    }

    /// Keep ids as they are, ordering by id.
    pub(crate) fn from_ids(mut trajectories: Vec<Trajectory>) -> Self {
        trajectories.sort_by_key(Trajectory::id);
        Self { trajectories }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    #[inline]
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trajectory> {
        self.trajectories.iter()
    }

    pub fn get(&self, id: usize) -> Option<&Trajectory> {
        self.trajectories
            .binary_search_by_key(&id, Trajectory::id)
            .ok()
            .map(|i| &self.trajectories[i])
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Trajectory> {
        self.trajectories
            .binary_search_by_key(&id, Trajectory::id)
            .ok()
            .map(|i| &mut self.trajectories[i])
    }

    /// Rows grouped by trajectory, frames ascending within each.
    pub fn records(&self) -> impl Iterator<Item = TrajectoryRecord> + '_ {
        self.trajectories.iter().flat_map(|t| {
            t.points().iter().map(move |&point| TrajectoryRecord {
                trajectory: t.id(),
                point,
            })
        })
    }

    /// Total number of points over all trajectories.
    pub fn point_count(&self) -> usize {
        self.trajectories.iter().map(Trajectory::len).sum()
    }

    /// Trajectories with a point in `frame`.
    pub fn in_frame(&self, frame: usize) -> impl Iterator<Item = &Trajectory> + '_ {
        self.trajectories
            .iter()
            .filter(move |t| (t.start_frame()..=t.end_frame()).contains(&frame))
    }
}

impl<'a> IntoIterator for &'a TrajectorySet {
    type Item = &'a Trajectory;
    type IntoIter = std::slice::Iter<'a, Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.trajectories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spot_detection::Candidate;
    use glam::DVec2;

    fn track(id: usize, start: usize, len: usize) -> Trajectory {
        let p = |f: usize| TrajectoryPoint::from_candidate(f, &Candidate::at(DVec2::new(f as f64, 0.0)));
        let mut t = Trajectory::new(id, p(start));
        for f in start + 1..start + len {
            t.extend(p(f)).unwrap();
        }
        t
    }

    #[test]
    fn renumbers_densely() {
        let set = TrajectorySet::renumbered(vec![track(7, 0, 3), track(2, 1, 2)]);
        let ids: Vec<usize> = set.iter().map(Trajectory::id).collect();
        assert_eq!(ids, vec![TRAJECTORY_ID_BASE, TRAJECTORY_ID_BASE + 1]);
        assert_eq!(set.get(TRAJECTORY_ID_BASE + 1).unwrap().start_frame(), 1);
        assert!(set.get(TRAJECTORY_ID_BASE + 2).is_none());
    }

    #[test]
    fn records_are_grouped_and_ordered() {
        let set = TrajectorySet::renumbered(vec![track(0, 2, 3), track(1, 0, 2)]);
        let rows: Vec<(usize, usize)> = set.records().map(|r| (r.trajectory, r.point.frame)).collect();
        assert_eq!(rows, vec![(0, 2), (0, 3), (0, 4), (1, 0), (1, 1)]);
        assert_eq!(set.point_count(), 5);
    }

    #[test]
    fn frame_lookup() {
        let set = TrajectorySet::renumbered(vec![track(0, 2, 3), track(1, 0, 2)]);
        let ids: Vec<usize> = set.in_frame(1).map(Trajectory::id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(set.in_frame(4).count(), 1);
        assert_eq!(set.in_frame(5).count(), 0);
    }

    #[test]
    fn stoichiometry_is_settable() {
        let mut set = TrajectorySet::renumbered(vec![track(0, 0, 3)]);
        set.get_mut(0).unwrap().stoichiometry = Some(2.0);
        assert_eq!(set.get(0).unwrap().stoichiometry, Some(2.0));
    }
}
