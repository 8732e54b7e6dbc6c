use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable read by [`RingConfig::from_env`].
pub const REPLICATION_FACTOR_ENV: &str = "HASHRING_REPLICATION_FACTOR";

/// Default virtual nodes per physical node.
///
/// At 160 replicas the owned share of each node stays within a few percent of
/// the mean for small clusters while keeping membership changes cheap.
pub const DEFAULT_REPLICATION_FACTOR: u32 = 160;

/// Upper bound on virtual nodes per physical node.
pub const MAX_REPLICATION_FACTOR: u32 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub replication_factor: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
        }
    }
}

impl RingConfig {
    pub fn new(replication_factor: u32) -> Self {
        Self { replication_factor }
    }

    /// Read configuration from the environment, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but unparseable and
    /// [`Error::InvalidReplicationFactor`] if the result is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(REPLICATION_FACTOR_ENV) {
            config.replication_factor = raw.trim().parse().map_err(|e| {
                Error::Config(format!("{}={:?}: {}", REPLICATION_FACTOR_ENV, raw, e))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_REPLICATION_FACTOR).contains(&self.replication_factor) {
            return Err(Error::InvalidReplicationFactor(self.replication_factor));
        }
        Ok(())
    }
}
