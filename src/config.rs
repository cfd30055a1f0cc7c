//! Engine configuration.
//!
//! Limits applied when rule sets are published and when they are evaluated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`EngineConfig::max_rule_depth`].
pub const ENV_MAX_RULE_DEPTH: &str = "TRANSFER_AUTH_MAX_RULE_DEPTH";
/// Environment variable overriding [`EngineConfig::max_rule_nodes`].
pub const ENV_MAX_RULE_NODES: &str = "TRANSFER_AUTH_MAX_RULE_NODES";
/// Environment variable overriding [`EngineConfig::max_keys_per_predicate`].
pub const ENV_MAX_KEYS_PER_PREDICATE: &str = "TRANSFER_AUTH_MAX_KEYS_PER_PREDICATE";
/// Environment variable overriding [`EngineConfig::max_operations`].
pub const ENV_MAX_OPERATIONS: &str = "TRANSFER_AUTH_MAX_OPERATIONS";
/// Environment variable overriding [`EngineConfig::max_rule_cost`].
pub const ENV_MAX_RULE_COST: &str = "TRANSFER_AUTH_MAX_RULE_COST";

/// Ceiling for [`EngineConfig::max_rule_depth`]; evaluation recurses once per level.
pub const MAX_RULE_DEPTH_CEILING: usize = 256;
/// Ceiling for [`EngineConfig::max_rule_nodes`].
pub const MAX_RULE_NODES_CEILING: usize = 65_536;
/// Ceiling for [`EngineConfig::max_keys_per_predicate`].
pub const MAX_KEYS_PER_PREDICATE_CEILING: usize = 4_096;
/// Ceiling for [`EngineConfig::max_operations`].
pub const MAX_OPERATIONS_CEILING: usize = 256;
/// Ceiling for [`EngineConfig::max_rule_cost`].
pub const MAX_RULE_COST_CEILING: usize = 1 << 20;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
    #[error("Invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: alloc::string::String },
    #[error("{name} is {value}, the most supported is {max}")]
    LimitTooLarge { name: &'static str, value: usize, max: usize },
}

/// Limits for rule set publication and evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deepest rule node evaluated before failing closed.
    pub max_rule_depth: usize,
    /// Largest rule arena accepted at publication.
    pub max_rule_nodes: usize,
    /// Largest key set a single predicate may list.
    pub max_keys_per_predicate: usize,
    /// Most operations a rule set may define.
    pub max_operations: usize,
    /// Most node visits a fully expanded operation tree may need, counting
    /// shared children once per parent.
    pub max_rule_cost: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rule_depth: 32,
            max_rule_nodes: 256,
            max_keys_per_predicate: 64,
            max_operations: 16,
            max_rule_cost: 4_096,
        }
    }
}

impl EngineConfig {
    /// Reject limits that would refuse every rule set, or that exceed what
    /// evaluation can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_rule_depth", self.max_rule_depth, MAX_RULE_DEPTH_CEILING),
            ("max_rule_nodes", self.max_rule_nodes, MAX_RULE_NODES_CEILING),
            ("max_keys_per_predicate", self.max_keys_per_predicate, MAX_KEYS_PER_PREDICATE_CEILING),
            ("max_operations", self.max_operations, MAX_OPERATIONS_CEILING),
            ("max_rule_cost", self.max_rule_cost, MAX_RULE_COST_CEILING),
        ];
        for (name, value, max) in limits {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(name));
            }
            if value > max {
                return Err(ConfigError::LimitTooLarge { name, value, max });
            }
        }
        Ok(())
    }

    /// Defaults overridden by any `TRANSFER_AUTH_*` variables that are set.
    #[cfg(feature = "std")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by values returned from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<alloc::string::String>,
    {
        let mut config = Self::default();
        let fields: [(&'static str, &mut usize); 5] = [
            (ENV_MAX_RULE_DEPTH, &mut config.max_rule_depth),
            (ENV_MAX_RULE_NODES, &mut config.max_rule_nodes),
            (ENV_MAX_KEYS_PER_PREDICATE, &mut config.max_keys_per_predicate),
            (ENV_MAX_OPERATIONS, &mut config.max_operations),
            (ENV_MAX_RULE_COST, &mut config.max_rule_cost),
        ];
        for (name, slot) in fields {
            if let Some(raw) = lookup(name) {
                *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    name,
                    value: raw.clone(),
                })?;
            }
        }
        config.validate()?;
        Ok(config)
    }
}
