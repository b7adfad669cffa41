//! Arena configuration parameters.

/// Configuration for a method's metadata arena.
///
/// The capacity is usually found by loading the method once with
/// profiling enabled and reading back the high-water mark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Capacity of the metadata arena in bytes.
    ///
    /// Default: 4 MiB.
    pub method_arena_bytes: usize,

    /// Name under which allocation statistics are recorded.
    ///
    /// `None` disables profiling.
    pub profiling_name: Option<String>,
}

impl ArenaConfig {
    /// Default metadata arena capacity: 4 MiB.
    pub const DEFAULT_METHOD_ARENA_BYTES: usize = 4 * 1024 * 1024;

    /// Name used by the runner when profiling is requested.
    pub const DEFAULT_PROFILING_NAME: &'static str = "method allocator";

    /// Create a config with the given arena capacity and profiling disabled.
    pub fn new(method_arena_bytes: usize) -> Self {
        Self {
            method_arena_bytes,
            profiling_name: None,
        }
    }

    /// Enable allocation profiling under `name`.
    pub fn with_profiling(mut self, name: impl Into<String>) -> Self {
        self.profiling_name = Some(name.into());
        self
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_METHOD_ARENA_BYTES)
    }
}
