//! Worker pool construction shared by the manifest builder and the engines.

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Number of workers to use for a requested thread count.
///
/// `0` means one worker per available hardware thread.
#[must_use]
pub fn effective_threads(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Build a dedicated rayon pool with `threads` workers (`0` = auto).
///
/// # Errors
///
/// Returns the rayon error if the OS refuses to spawn the worker threads.
pub fn build_pool(threads: usize, name: &'static str) -> Result<ThreadPool, ThreadPoolBuildError> {
    let threads = effective_threads(threads);
    log::debug!("Starting {} pool with {} worker(s)", name, threads);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |idx| format!("packrat-{name}-{idx}"))
        .build()
}
