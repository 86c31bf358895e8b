//! Configuration APIs for vkern
//!
//! Two configuration types control the library:
//!
//! - [`DispatchConfig`]: selection policy (forced generic, masked tags,
//!   priority overrides, profile location)
//! - [`ProfilerConfig`]: offline profiler measurement parameters
//!
//! Both can be built from defaults, from environment variables or from a
//! JSON file.
//!
//! ```rust
//! use vkern::config::{Config, DispatchConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize from environment variables with VKERN_ prefix
//! let config = DispatchConfig::from_env()?;
//!
//! // Initialize from environment with custom prefix
//! let config = DispatchConfig::from_env_with_prefix("MYAPP_")?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, VkernError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::Path;

pub mod dispatch;
pub mod profiler;

pub use dispatch::DispatchConfig;
pub use profiler::ProfilerConfig;

/// Environment variable prefix used by [`Config::from_env`]
pub const ENV_PREFIX: &str = "VKERN_";

/// Common configuration trait providing validation, environment
/// initialization and file persistence.
pub trait Config: Clone + fmt::Debug + Serialize + DeserializeOwned {
    /// Short name used in error messages
    const NAME: &'static str;

    /// Validate the configuration for correctness and consistency.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, `Err` with details if invalid.
    fn validate(&self) -> Result<()>;

    /// Initialize configuration from environment variables.
    ///
    /// Variables use the format `VKERN_{FIELD}`, for example
    /// `VKERN_GENERIC=1` forces the generic implementations.
    fn from_env() -> Result<Self>
    where
        Self: Default,
    {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Initialize configuration from environment variables with a custom prefix.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The environment variable prefix to use
    fn from_env_with_prefix(prefix: &str) -> Result<Self>
    where
        Self: Default;

    /// Save configuration to a JSON file.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self).map_err(|e| {
            VkernError::configuration(format!("Failed to serialize {} config: {}", Self::NAME, e))
        })?;
        std::fs::write(path, serialized).map_err(|e| {
            VkernError::configuration(format!("Failed to write {} config file: {}", Self::NAME, e))
        })?;
        Ok(())
    }

    /// Load configuration from a JSON file.
    ///
    /// The loaded configuration is validated before it is returned.
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VkernError::configuration(format!("Failed to read {} config file: {}", Self::NAME, e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            VkernError::configuration(format!("Failed to parse {} config file: {}", Self::NAME, e))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// Utility function to parse environment variable with fallback to default.
///
/// Unset or unparsable values yield `default`.
pub fn parse_env_var<T>(var_name: &str, default: T) -> T
where
    T: std::str::FromStr + Clone,
{
    env::var(var_name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Utility function to parse boolean environment variable.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive) as true,
/// everything else as false.
pub fn parse_env_bool(var_name: &str, default: bool) -> bool {
    env::var(var_name)
        .ok()
        .map(|s| {
            let s = s.trim().to_lowercase();
            matches!(s.as_str(), "true" | "1" | "yes" | "on")
        })
        .unwrap_or(default)
}

/// Split a comma separated list, dropping empty items
pub(crate) fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
