//! Assignment of a frame's candidates to open trajectory endpoints.

use std::fmt::Debug;
use std::sync::Arc;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Decides which open trajectory, if any, each candidate continues.
///
/// `assign` returns one entry per candidate: `Some(j)` to extend the
/// trajectory ending at `endpoints[j]`, `None` to start a new one. An
/// endpoint is used at most once and only for a candidate strictly closer
/// than `max_displacement`.
pub trait MatchingStrategy: Debug + Send + Sync {
    fn assign(
        &self,
        candidates: &[DVec2],
        endpoints: &[DVec2],
        max_displacement: f64,
    ) -> Vec<Option<usize>>;
}

/// Built-in strategies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchingMethod {
    /// First-claimed-wins, ambiguous candidates start new trajectories.
    #[default]
    Greedy,
    /// Minimum total displacement over all gated pairs.
    Optimal,
}

impl MatchingMethod {
    pub fn build(self) -> Arc<dyn MatchingStrategy> {
        match self {
            MatchingMethod::Greedy => Arc::new(GreedyMatching),
            MatchingMethod::Optimal => Arc::new(OptimalMatching),
        }
    }
}

/// Candidates are visited in order.
///
/// - no endpoint in range: new trajectory
/// - exactly one: extend it, unless an earlier candidate already claimed it
/// - more than one: ambiguous, new trajectory
///
/// With symmetric configurations the outcome depends on candidate order.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyMatching;

impl MatchingStrategy for GreedyMatching {
    fn assign(
        &self,
        candidates: &[DVec2],
        endpoints: &[DVec2],
        max_displacement: f64,
    ) -> Vec<Option<usize>> {
        let mut claimed = vec![false; endpoints.len()];
        candidates
            .iter()
            .map(|c| {
                let mut in_range = endpoints
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| c.distance(**e) < max_displacement)
                    .map(|(j, _)| j);
                match (in_range.next(), in_range.next()) {
                    (Some(j), None) if !claimed[j] => {
                        claimed[j] = true;
                        Some(j)
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

/// Hungarian assignment maximizing the number of in-range pairs, then
/// minimizing their summed distance. Independent of candidate order up to
/// exact cost ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalMatching;

impl MatchingStrategy for OptimalMatching {
    fn assign(
        &self,
        candidates: &[DVec2],
        endpoints: &[DVec2],
        max_displacement: f64,
    ) -> Vec<Option<usize>> {
        let mut result = vec![None; candidates.len()];
        if candidates.is_empty() || endpoints.is_empty() {
            return result;
        }

        // Any out-of-range pair costs more than every in-range pair together.
        let forbidden = max_displacement * (candidates.len().max(endpoints.len()) + 1) as f64;
        let costs: Vec<Vec<f64>> = candidates
            .iter()
            .map(|c| {
                endpoints
                    .iter()
                    .map(|e| {
                        let d = c.distance(*e);
                        if d < max_displacement {
                            d
                        } else {
                            forbidden
                        }
                    })
                    .collect()
            })
            .collect();

        for (i, j) in hungarian(&costs, forbidden) {
            if costs[i][j] < max_displacement {
                result[i] = Some(j);
            }
        }
        result
    }
}

/// Potential-based O(n^3) Hungarian algorithm on a rectangular matrix padded
/// to square with `pad`. Returns `(row, col)` pairs for real cells only.
fn hungarian(costs: &[Vec<f64>], pad: f64) -> Vec<(usize, usize)> {
    let n_rows = costs.len();
    let n_cols = costs.first().map_or(0, Vec::len);
    if n_rows == 0 || n_cols == 0 {
        return Vec::new();
    }
    let n = n_rows.max(n_cols);
    let cost = |i: usize, j: usize| -> f64 {
        if i < n_rows && j < n_cols {
            costs[i][j]
        } else {
            pad
        }
    };

    // 1-indexed; u = row potentials, v = column potentials, p[j] = row in column j.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut min_val = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=n {
                if !used[j] {
                    let val = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if val < min_val[j] {
                        min_val[j] = val;
                        way[j] = j0;
                    }
                    if min_val[j] < delta {
                        delta = min_val[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_val[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let prev = way[j0];
            p[j0] = p[prev];
            j0 = prev;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=n)
        .filter(|&j| p[j] != 0 && p[j] - 1 < n_rows && j - 1 < n_cols)
        .map(|j| (p[j] - 1, j - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}
