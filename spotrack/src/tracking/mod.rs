//! Linking of per-frame candidates into trajectories.

mod linker;
mod matching;
mod store;
mod trajectory;
mod tsv;

pub use linker::{LinkStats, TrajectoryLinker};
pub use matching::{GreedyMatching, MatchingMethod, MatchingStrategy, OptimalMatching};
pub use store::{TrajectoryRecord, TrajectorySet, TRAJECTORY_ID_BASE};
pub use trajectory::{Trajectory, TrajectoryPoint};
pub use tsv::{read_tsv, read_tsv_file, write_tsv, write_tsv_file, TSV_HEADER};
