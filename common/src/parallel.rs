//! Ordered fan-out/fan-in over a bounded worker pool.
//!
//! Results land in an index-keyed `Vec`, so completion order of the workers
//! never leaks into the output order.

use rayon::prelude::*;

/// Maps `f(index, item)` over `items` on a dedicated pool of `num_workers` threads.
///
/// `num_workers == 0` runs sequentially on the calling thread. Output `i`
/// always corresponds to input `i`.
pub fn par_map_indexed<T, R, F>(
    items: &[T],
    num_workers: usize,
    f: F,
) -> Result<Vec<R>, rayon::ThreadPoolBuildError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    if num_workers == 0 {
        return Ok(items.iter().enumerate().map(|(i, item)| f(i, item)).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()?;

    Ok(pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map(|(i, item)| f(i, item))
            .collect()
    }))
}

/// Number of processing units available to this process, at least 1.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
