//! Error type for container operations.

use thiserror::Error;

/// Errors reported by [`ConcurrentArray`](crate::ConcurrentArray) and its strategies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrataError {
    /// Index outside `[0, len)`.
    #[error("index out of bounds: index {index}, len {len}")]
    IndexOutOfBounds {
        /// The rejected index
        index: usize,
        /// Length observed when the access was checked
        len: usize,
    },

    /// Growth past the configured maximum capacity. Nothing was changed.
    #[error("capacity overflow: requested {requested}, max {max}")]
    CapacityOverflow {
        /// Capacity the operation needed
        requested: usize,
        /// Configured maximum capacity
        max: usize,
    },

    /// Rejected configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong with the configuration
        message: String,
    },

    /// Strategy name that matches none of the seven strategies.
    #[error("unknown strategy: {name}")]
    UnknownStrategy {
        /// The name that failed to parse
        name: String,
    },
}

impl StrataError {
    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }

    /// Create a capacity overflow error
    pub fn capacity_overflow(requested: usize, max: usize) -> Self {
        Self::CapacityOverflow { requested, max }
    }

    /// Create an invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unknown strategy error
    pub fn unknown_strategy<S: Into<String>>(name: S) -> Self {
        Self::UnknownStrategy { name: name.into() }
    }

    /// Short category name, suitable as a log or metrics key.
    pub fn category(&self) -> &'static str {
        match self {
            Self::IndexOutOfBounds { .. } => "bounds",
            Self::CapacityOverflow { .. } => "capacity",
            Self::InvalidConfig { .. } => "config",
            Self::UnknownStrategy { .. } => "strategy",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StrataError>;

/// Fail with [`StrataError::IndexOutOfBounds`] unless `index < len`.
#[inline]
pub fn check_bounds(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(StrataError::index_out_of_bounds(index, len))
    }
}
