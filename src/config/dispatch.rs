//! Selection policy configuration.

use super::{parse_env_bool, split_list, Config};
use crate::error::{Result, VkernError};
use crate::profile::Profile;
use crate::system::ArchTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// Inputs of the selector that are policy rather than hardware facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Always bind the zero-requirement implementation
    pub force_generic: bool,
    /// Tags masked out of the detected capability set before selection
    pub disabled_tags: Vec<String>,
    /// Replacement priorities keyed by implementation name
    pub priority_overrides: BTreeMap<String, i32>,
    /// Consult the persisted profile when binding
    pub use_profile: bool,
    /// Profile location; `None` means the per-user default
    pub profile_path: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            force_generic: false,
            disabled_tags: Vec::new(),
            priority_overrides: BTreeMap::new(),
            use_profile: true,
            profile_path: None,
        }
    }
}

impl DispatchConfig {
    /// Policy that binds generic implementations everywhere
    pub fn generic_only() -> Self {
        Self {
            force_generic: true,
            use_profile: false,
            ..Self::default()
        }
    }

    /// Policy using declared priorities only, ignoring any profile
    pub fn static_priority() -> Self {
        Self {
            use_profile: false,
            ..Self::default()
        }
    }

    /// Masked tags resolved against the built-in tag names.
    ///
    /// Unknown names are skipped; [`Config::validate`] rejects them.
    pub fn disabled_arch_tags(&self) -> Vec<ArchTag> {
        self.disabled_tags
            .iter()
            .filter_map(|name| ArchTag::from_name(name))
            .collect()
    }

    /// Profile file to read, or `None` when profiles are disabled or no
    /// home directory is known.
    pub fn resolved_profile_path(&self) -> Option<PathBuf> {
        if !self.use_profile {
            return None;
        }
        self.profile_path.clone().or_else(Profile::default_path)
    }

    /// Parse a `name=priority` comma separated list.
    pub fn parse_priority_list(value: &str) -> Result<BTreeMap<String, i32>> {
        split_list(value).map(Self::parse_priority_item).collect()
    }

    fn parse_priority_item(item: &str) -> Result<(String, i32)> {
        let (name, priority) = item.split_once('=').ok_or_else(|| {
            VkernError::configuration(format!(
                "priority override '{}' is not of the form name=value",
                item
            ))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(VkernError::configuration(format!(
                "priority override '{}' has an empty implementation name",
                item
            )));
        }
        let priority: i32 = priority.trim().parse().map_err(|e| {
            VkernError::configuration(format!(
                "priority override '{}' has an invalid value: {}",
                item, e
            ))
        })?;
        Ok((name.to_string(), priority))
    }

    /// Read the environment item by item, dropping only what is invalid.
    ///
    /// Unknown tags in `DISABLE_ARCH` and malformed `PRIORITY` items are
    /// logged and skipped; every other variable still applies. Used for the
    /// process-wide dispatch context, where a typo must not switch off
    /// `GENERIC`.
    pub fn from_env_lenient(prefix: &str) -> Self {
        let mut config = Self::default();
        config.force_generic =
            parse_env_bool(&format!("{}GENERIC", prefix), config.force_generic);
        config.use_profile = parse_env_bool(&format!("{}USE_PROFILE", prefix), config.use_profile);

        if let Ok(value) = env::var(format!("{}DISABLE_ARCH", prefix)) {
            for name in split_list(&value) {
                if ArchTag::from_name(name).is_some() {
                    config.disabled_tags.push(name.to_string());
                } else {
                    log::warn!(
                        "Ignoring unknown architecture tag '{}' in {}DISABLE_ARCH",
                        name,
                        prefix
                    );
                }
            }
        }
        if let Ok(value) = env::var(format!("{}PRIORITY", prefix)) {
            for item in split_list(&value) {
                match Self::parse_priority_item(item) {
                    Ok((name, priority)) => {
                        config.priority_overrides.insert(name, priority);
                    }
                    Err(e) => log::warn!("Ignoring {}PRIORITY item: {}", prefix, e),
                }
            }
        }
        if let Ok(value) = env::var(format!("{}PROFILE_PATH", prefix)) {
            if !value.trim().is_empty() {
                config.profile_path = Some(PathBuf::from(value.trim()));
            }
        }

        config
    }
}

impl Config for DispatchConfig {
    const NAME: &'static str = "dispatch";

    fn validate(&self) -> Result<()> {
        for name in &self.disabled_tags {
            if ArchTag::from_name(name).is_none() {
                return Err(VkernError::configuration(format!(
                    "unknown architecture tag '{}' in disabled_tags",
                    name
                )));
            }
        }
        if self.priority_overrides.keys().any(|name| name.trim().is_empty()) {
            return Err(VkernError::configuration(
                "priority_overrides contains an empty implementation name",
            ));
        }
        Ok(())
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.force_generic =
            parse_env_bool(&format!("{}GENERIC", prefix), config.force_generic);
        config.use_profile = parse_env_bool(&format!("{}USE_PROFILE", prefix), config.use_profile);

        if let Ok(value) = env::var(format!("{}DISABLE_ARCH", prefix)) {
            config.disabled_tags = split_list(&value).map(str::to_string).collect();
        }
        if let Ok(value) = env::var(format!("{}PRIORITY", prefix)) {
            config.priority_overrides = Self::parse_priority_list(&value)?;
        }
        if let Ok(value) = env::var(format!("{}PROFILE_PATH", prefix)) {
            if !value.trim().is_empty() {
                config.profile_path = Some(PathBuf::from(value.trim()));
            }
        }

        config.validate()?;
        Ok(config)
    }
}
