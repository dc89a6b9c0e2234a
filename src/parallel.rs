// rayon thread pool for assembly, SpMV, dot products and block solves

/// Size the global rayon pool and return the number of worker threads.
///
/// `None` or `Some(0)` uses one thread per core. The global pool can only be
/// built once per process; later calls keep the existing pool.
#[cfg(feature = "rayon")]
pub fn configure_threads(threads: Option<usize>) -> usize {
    let wanted = threads.filter(|&t| t > 0).unwrap_or_else(num_cpus::get);
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(wanted).build_global() {
        log::debug!("keeping existing rayon pool: {e}");
    }
    rayon::current_num_threads()
}

#[cfg(not(feature = "rayon"))]
pub fn configure_threads(threads: Option<usize>) -> usize {
    if threads.is_some_and(|t| t > 1) {
        log::warn!("built without the rayon feature; running on one thread");
    }
    1
}

/// Worker threads currently available for parallel loops.
pub fn current_threads() -> usize {
    #[cfg(feature = "rayon")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "rayon"))]
    {
        1
    }
}
