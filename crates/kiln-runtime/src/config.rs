//! Runtime configuration and validation.

use std::error::Error;
use std::fmt;

use kiln_arena::ArenaConfig;

// ── InputPolicy ────────────────────────────────────────────────────

/// How [`run_method`](crate::run_method) initialises inputs before
/// handing the method to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputPolicy {
    /// Fill every tensor input with ones.
    #[default]
    Ones,
    /// Leave planned memory as allocated; the caller sets every input.
    Caller,
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`RuntimeConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The metadata arena capacity is zero.
    ZeroArenaCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroArenaCapacity => write!(f, "method_arena_bytes must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

// ── RuntimeConfig ──────────────────────────────────────────────────

/// Settings for one complete load cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Capacity of the metadata arena in bytes. Default: 4 MiB.
    pub method_arena_bytes: usize,
    /// Record arena statistics and per-instruction timings. Default: false.
    pub profiling: bool,
    /// Input initialisation. Default: [`InputPolicy::Ones`].
    pub input_policy: InputPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            method_arena_bytes: ArenaConfig::DEFAULT_METHOD_ARENA_BYTES,
            profiling: false,
            input_policy: InputPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Check the configuration before any memory is reserved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.method_arena_bytes == 0 {
            return Err(ConfigError::ZeroArenaCapacity);
        }
        Ok(())
    }

    /// Arena settings derived from this configuration.
    pub fn arena_config(&self) -> ArenaConfig {
        let config = ArenaConfig::new(self.method_arena_bytes);
        if self.profiling {
            config.with_profiling(ArenaConfig::DEFAULT_PROFILING_NAME)
        } else {
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_four_mib_with_ones() {
        let c = RuntimeConfig::default();
        assert_eq!(c.method_arena_bytes, 4 * 1024 * 1024);
        assert!(!c.profiling);
        assert_eq!(c.input_policy, InputPolicy::Ones);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_arena_is_rejected() {
        let c = RuntimeConfig {
            method_arena_bytes: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::ZeroArenaCapacity));
    }

    #[test]
    fn profiling_names_the_arena() {
        let c = RuntimeConfig {
            profiling: true,
            ..RuntimeConfig::default()
        };
        assert_eq!(
            c.arena_config().profiling_name.as_deref(),
            Some("method allocator")
        );
        assert_eq!(RuntimeConfig::default().arena_config().profiling_name, None);
    }
}
