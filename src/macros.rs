#![allow(unused_macros)]

/// Helper macro for locking items
///
/// Trace masks are only locked at test boundaries, so a poisoned lock means a test harness
/// thread panicked mid-transition; the error is surfaced instead of recovering the guard.
///
/// ```rust, ignore
///  let guard = lock!(mask.lock)?;
///  mask.clear();
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)
    };
}
