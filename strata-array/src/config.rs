//! Container configuration.
//!
//! Values come from code (builder methods) or from the environment:
//!
//! | variable                    | field                |
//! |-----------------------------|----------------------|
//! | `STRATA_STRATEGY`           | `strategy`           |
//! | `STRATA_INITIAL_CAPACITY`   | `initial_capacity`   |
//! | `STRATA_MAX_CAPACITY`       | `max_capacity`       |
//! | `STRATA_OPTIMISTIC_RETRIES` | `optimistic_retries` |

use crate::error::{Result, StrataError};
use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};
use std::env;
use std::num::ParseIntError;
use std::str::FromStr;

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "STRATA_";

/// Largest capacity any store may be configured for.
pub const CAPACITY_LIMIT: usize = isize::MAX as usize / 16;

/// Settings for a [`ConcurrentArray`](crate::ConcurrentArray).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Strategy the container starts with
    pub strategy: StrategyKind,
    /// Slots allocated up front (and again by `clear`)
    pub initial_capacity: usize,
    /// Growth beyond this many slots fails with `CapacityOverflow`
    pub max_capacity: usize,
    /// Failed optimistic validations before a stamped read takes the read lock
    pub optimistic_retries: u32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::FixedSize,
            initial_capacity: 16,
            max_capacity: CAPACITY_LIMIT,
            optimistic_retries: 8,
        }
    }
}

impl ContainerConfig {
    /// Default configuration running `strategy`.
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Set the starting strategy.
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the initial capacity.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Set the maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the optimistic retry bound.
    pub fn with_optimistic_retries(mut self, optimistic_retries: u32) -> Self {
        self.optimistic_retries = optimistic_retries;
        self
    }

    /// Check the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(StrataError::invalid_config(
                "max_capacity must be greater than 0",
            ));
        }
        if self.max_capacity > CAPACITY_LIMIT {
            return Err(StrataError::invalid_config(format!(
                "max_capacity {} exceeds the limit of {CAPACITY_LIMIT}",
                self.max_capacity
            )));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(StrataError::invalid_config(format!(
                "initial_capacity {} exceeds max_capacity {}",
                self.initial_capacity, self.max_capacity
            )));
        }
        Ok(())
    }

    /// Load from `STRATA_*` environment variables, defaulting unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Load from environment variables named `{prefix}STRATEGY` and so on.
    ///
    /// Unset variables keep their default; set but malformed ones are errors.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let defaults = Self::default();
        let strategy = match env_value(&format!("{prefix}STRATEGY"))? {
            Some(raw) => raw.parse()?,
            None => defaults.strategy,
        };
        let config = Self {
            strategy,
            initial_capacity: parse_env_number(
                &format!("{prefix}INITIAL_CAPACITY"),
                defaults.initial_capacity,
            )?,
            max_capacity: parse_env_number(
                &format!("{prefix}MAX_CAPACITY"),
                defaults.max_capacity,
            )?,
            optimistic_retries: parse_env_number(
                &format!("{prefix}OPTIMISTIC_RETRIES"),
                defaults.optimistic_retries,
            )?,
        };
        config.validate()?;
        log::debug!("loaded container config from {prefix}* environment: {config:?}");
        Ok(config)
    }
}

fn env_value(var_name: &str) -> Result<Option<String>> {
    match env::var(var_name) {
        Ok(raw) => Ok(Some(raw.trim().to_owned())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(StrataError::invalid_config(format!(
            "{var_name} is not valid unicode"
        ))),
    }
}

fn parse_env_number<T>(var_name: &str, default: T) -> Result<T>
where
    T: FromStr<Err = ParseIntError>,
{
    match env_value(var_name)? {
        Some(raw) => raw
            .parse()
            .map_err(|err| StrataError::invalid_config(format!("{var_name}={raw}: {err}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = ContainerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, StrategyKind::FixedSize);
        assert_eq!(config.optimistic_retries, 8);
    }

    #[test]
    fn builder_and_validation() {
        let config = ContainerConfig::new(StrategyKind::StampedLock)
            .with_initial_capacity(64)
            .with_max_capacity(32);
        assert_eq!(config.validate().unwrap_err().category(), "config");

        let config = config.with_max_capacity(0);
        assert!(config.validate().is_err());

        let config = config.with_initial_capacity(0).with_max_capacity(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_env_with_prefix() {
        // Prefix unique to this test; the environment is process-wide.
        env::set_var("STRATA_CFGTEST_STRATEGY", "fast_layout_lock");
        env::set_var("STRATA_CFGTEST_MAX_CAPACITY", "4096");
        let config = ContainerConfig::from_env_with_prefix("STRATA_CFGTEST_").unwrap();
        assert_eq!(config.strategy, StrategyKind::FastLayoutLock);
        assert_eq!(config.max_capacity, 4096);
        assert_eq!(config.initial_capacity, 16);

        env::set_var("STRATA_CFGTEST_MAX_CAPACITY", "lots");
        let err = ContainerConfig::from_env_with_prefix("STRATA_CFGTEST_").unwrap_err();
        assert_eq!(err.category(), "config");

        env::set_var("STRATA_CFGTEST_MAX_CAPACITY", "4096");
        env::set_var("STRATA_CFGTEST_STRATEGY", "rcu");
        let err = ContainerConfig::from_env_with_prefix("STRATA_CFGTEST_").unwrap_err();
        assert_eq!(err, StrataError::unknown_strategy("rcu"));

        env::remove_var("STRATA_CFGTEST_STRATEGY");
        env::remove_var("STRATA_CFGTEST_MAX_CAPACITY");
    }
}
