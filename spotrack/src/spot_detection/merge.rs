//! Collapsing near-duplicate candidates.
//!
//! Candidates closer than [`MERGE_DISTANCE`] are clustered transitively and
//! each cluster is replaced by the mean of its members. Clustering repeats
//! until no two cluster means are close, so merging an already merged set
//! changes nothing.

use std::cmp::Ordering;

use glam::DVec2;

use super::candidate::Candidate;

/// Candidates strictly closer than this are duplicates.
pub const MERGE_DISTANCE: f64 = 2.0;

const MERGE_DISTANCE_SQ: f64 = MERGE_DISTANCE * MERGE_DISTANCE;

/// Stateless near-duplicate merger.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateMerger;

impl CandidateMerger {
    /// Merge near-duplicates. Output is sorted by position (row, then column)
    /// and never longer than the input. The result does not depend on input
    /// order.
    pub fn merge(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|a, b| row_major(a.pos, b.pos));

        // Each cluster holds indices into `sorted`, ascending.
        let mut clusters: Vec<Vec<usize>> = (0..sorted.len()).map(|i| vec![i]).collect();
        let mut means: Vec<DVec2> = sorted.iter().map(|c| c.pos).collect();

        loop {
            let mut uf = UnionFind::new(clusters.len());
            let mut merged_any = false;
            for i in 0..means.len() {
                for j in (i + 1)..means.len() {
                    if means[i].distance_squared(means[j]) < MERGE_DISTANCE_SQ {
                        merged_any |= uf.union(i, j);
                    }
                }
            }
            if !merged_any {
                break;
            }

            let mut regrouped: Vec<Vec<usize>> = Vec::new();
            let mut slot_of_root = vec![usize::MAX; clusters.len()];
            for (i, members) in clusters.iter().enumerate() {
                let root = uf.find(i);
                if slot_of_root[root] == usize::MAX {
                    slot_of_root[root] = regrouped.len();
                    regrouped.push(Vec::new());
                }
                regrouped[slot_of_root[root]].extend_from_slice(members);
            }
            for members in regrouped.iter_mut() {
                members.sort_unstable();
            }
            means = regrouped
                .iter()
                .map(|members| mean_position(&sorted, members))
                .collect();
            clusters = regrouped;
        }

        let mut merged: Vec<Candidate> = clusters
            .iter()
            .zip(&means)
            .map(|(members, &mean)| match members.as_slice() {
                [single] => sorted[*single],
                _ => Candidate {
                    pos: mean,
                    ..sorted[members[0]]
                },
            })
            .collect();
        merged.sort_by(|a, b| row_major(a.pos, b.pos));
        merged
    }
}

fn mean_position(sorted: &[Candidate], members: &[usize]) -> DVec2 {
    let sum = members
        .iter()
        .fold(DVec2::ZERO, |acc, &i| acc + sorted[i].pos);
    sum / members.len() as f64
}

fn row_major(a: DVec2, b: DVec2) -> Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

/// Disjoint sets over `0..n`; the smaller root wins.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = i;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Returns true if `a` and `b` were in different sets.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        let (smaller, larger) = if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[larger] = smaller;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> Candidate {
        Candidate::at(DVec2::new(x, y))
    }

    fn positions(candidates: &[Candidate]) -> Vec<DVec2> {
        candidates.iter().map(|c| c.pos).collect()
    }

    #[test]
    fn distant_candidates_are_untouched() {
        let input = vec![at(10.0, 10.0), at(20.0, 10.0), at(10.0, 20.0)];
        let merged = CandidateMerger.merge(&input);
        assert_eq!(positions(&merged), positions(&input));
    }

    #[test]
    fn close_pair_collapses_to_mean() {
        let merged = CandidateMerger.merge(&[at(10.0, 10.0), at(11.0, 11.0)]);
        assert_eq!(positions(&merged), vec![DVec2::new(10.5, 10.5)]);
    }

    #[test]
    fn exactly_merge_distance_is_not_a_duplicate() {
        let merged = CandidateMerger.merge(&[at(10.0, 10.0), at(12.0, 10.0)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn chain_merges_transitively() {
        // a-b and b-c are close, a-c is not
        let merged = CandidateMerger.merge(&[at(0.0, 5.0), at(1.5, 5.0), at(3.0, 5.0)]);
        assert_eq!(positions(&merged), vec![DVec2::new(1.5, 5.0)]);
    }

    #[test]
    fn order_does_not_matter() {
        let a = vec![
            at(3.0, 3.0),
            at(4.2, 3.1),
            at(5.5, 3.0),
            at(30.0, 7.0),
            at(31.0, 7.0),
            at(15.0, 15.0),
        ];
        let mut b = a.clone();
        b.reverse();
        let mut c = a.clone();
        c.rotate_left(2);
        let ma = CandidateMerger.merge(&a);
        assert_eq!(ma, CandidateMerger.merge(&b));
        assert_eq!(ma, CandidateMerger.merge(&c));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let input = vec![
            at(10.0, 10.0),
            at(11.0, 10.0),
            at(12.2, 10.0),
            at(13.9, 10.0),
            at(25.0, 4.0),
            at(26.0, 5.0),
            at(40.0, 40.0),
        ];
        let once = CandidateMerger.merge(&input);
        let twice = CandidateMerger.merge(&once);
        assert_eq!(once, twice);
        assert!(once.len() <= input.len());
    }

    #[test]
    fn four_point_chain_collapses_to_one() {
        let input = vec![at(0.0, 0.0), at(1.9, 0.0), at(3.6, 0.0), at(5.4, 0.0)];
        let merged = CandidateMerger.merge(&input);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].pos.x - 2.725).abs() < 1e-12);
    }

    #[test]
    fn empty_input() {
        assert!(CandidateMerger.merge(&[]).is_empty());
    }
}
