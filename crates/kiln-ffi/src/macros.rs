//! Boundary helpers shared by every `extern "C"` entry point.

/// Run `$body` (which evaluates to an `i32` status), converting a panic
/// into [`KilnStatus::Panicked`](crate::KilnStatus::Panicked).
macro_rules! ffi_guard {
    ($body:block) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> i32 { $body })) {
            Ok(status) => status,
            Err(_) => {
                tracing::error!("panic caught at FFI boundary");
                $crate::status::KilnStatus::Panicked as i32
            }
        }
    };
}

/// Lock a mutex, returning `InternalError` from the enclosing function if
/// it was poisoned.
macro_rules! ffi_lock {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(_) => return $crate::status::KilnStatus::InternalError as i32,
        }
    };
}
