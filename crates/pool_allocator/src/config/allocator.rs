//! Allocator configuration

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::foundation::logging;

/// Default capacity of the first pool
pub const DEFAULT_BASE_CAPACITY: u32 = 16;

/// Default per-pool set limit for descriptor pool backends
pub const DEFAULT_MAX_SETS_PER_POOL: u32 = 64;

/// # Allocator Configuration
///
/// Settings for a [`PoolAllocator`](crate::allocator::PoolAllocator) and the
/// backend that feeds it. Missing fields fall back to their defaults, so a
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Capacity of pool 0; later pools double from here
    pub base_capacity: u32,
    /// Upper bound on sets per pool for descriptor pool backends
    pub max_sets_per_pool: u32,
    /// Raw creation flag bits, interpreted by the backend
    pub creation_flags: u32,
    /// Default log filter for binaries embedding the allocator
    pub log_level: String,
}

impl AllocatorConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            base_capacity: DEFAULT_BASE_CAPACITY,
            max_sets_per_pool: DEFAULT_MAX_SETS_PER_POOL,
            creation_flags: 0,
            log_level: "info".to_string(),
        }
    }

    /// Set the capacity of the first pool
    pub fn with_base_capacity(mut self, capacity: u32) -> Self {
        self.base_capacity = capacity;
        self
    }

    /// Set the per-pool set limit
    pub fn with_max_sets_per_pool(mut self, max_sets: u32) -> Self {
        self.max_sets_per_pool = max_sets;
        self
    }

    /// Set raw creation flag bits
    pub fn with_creation_flags(mut self, bits: u32) -> Self {
        self.creation_flags = bits;
        self
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_capacity == 0 {
            return Err(ConfigError::Invalid("base_capacity must be at least 1".to_string()));
        }

        if self.max_sets_per_pool == 0 {
            return Err(ConfigError::Invalid("max_sets_per_pool must be at least 1".to_string()));
        }

        if logging::parse_level(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level: {}",
                self.log_level
            )));
        }

        Ok(())
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for AllocatorConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = AllocatorConfig::default();
        assert_eq!(config.base_capacity, 16);
        assert_eq!(config.max_sets_per_pool, 64);
        assert_eq!(config.creation_flags, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = AllocatorConfig::new().with_base_capacity(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_max_sets_rejected() {
        let config = AllocatorConfig::new().with_max_sets_per_pool(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let config = AllocatorConfig::new().with_log_level("chatty");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AllocatorConfig::from_toml_str("base_capacity = 4\n").unwrap();
        assert_eq!(config.base_capacity, 4);
        assert_eq!(config.max_sets_per_pool, DEFAULT_MAX_SETS_PER_POOL);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_ron_round_trip() {
        let config = AllocatorConfig::new()
            .with_base_capacity(8)
            .with_creation_flags(0x1)
            .with_log_level("debug");
        let text = config.to_ron_string().unwrap();
        let parsed = AllocatorConfig::from_ron_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
