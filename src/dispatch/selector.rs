//! Implementation selection.
//!
//! Precedence, highest first:
//!
//! 1. `force_generic` policy
//! 2. a profile entry for this kernel and host, when the named
//!    implementation exists, its tags are available and its alignment fits
//!    the path
//! 3. the first implementation in priority order whose tags are available
//!    and whose alignment fits the path
//!
//! The generic implementation satisfies step 3 for every input, so
//! selection is total.

use super::registry::{Alignment, Implementation, Kernel};
use crate::config::DispatchConfig;
use crate::profile::Profile;
use crate::system::{host_identity, ArchTag, CapabilitySet};
use std::collections::BTreeMap;
use std::fmt;

/// Which pointer contract the selected implementation serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryPath {
    /// Every pointer argument is aligned to the implementation's boundary
    Aligned,
    /// Pointers may have any alignment
    Unaligned,
}

impl MemoryPath {
    /// Whether an implementation with `alignment` may run on this path
    pub fn admits(self, alignment: Alignment) -> bool {
        match self {
            MemoryPath::Aligned => true,
            MemoryPath::Unaligned => alignment == Alignment::None,
        }
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryPath::Aligned => "aligned",
            MemoryPath::Unaligned => "unaligned",
        }
    }
}

impl fmt::Display for MemoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy knobs applied on top of the capability set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionPolicy {
    /// Always pick the zero-requirement implementation
    pub force_generic: bool,
    /// Tags treated as unsupported
    pub disabled_tags: Vec<ArchTag>,
    /// Replacement priorities keyed by implementation name
    pub priority_overrides: BTreeMap<String, i32>,
}

impl SelectionPolicy {
    /// Policy described by a dispatch configuration
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            force_generic: config.force_generic,
            disabled_tags: config.disabled_arch_tags(),
            priority_overrides: config.priority_overrides.clone(),
        }
    }

    /// Capability set left after masking disabled tags
    pub fn effective_capabilities(&self, capabilities: &CapabilitySet) -> CapabilitySet {
        capabilities.without(&self.disabled_tags)
    }
}

/// Chooses one implementation per kernel and path.
#[derive(Debug, Clone)]
pub struct Selector {
    policy: SelectionPolicy,
    host: String,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(SelectionPolicy::default())
    }
}

impl Selector {
    /// Selector keyed to the current machine's identity
    pub fn new(policy: SelectionPolicy) -> Self {
        Self::with_host(policy, host_identity())
    }

    /// Selector that reads profile entries recorded for `host`
    pub fn with_host(policy: SelectionPolicy, host: impl Into<String>) -> Self {
        Self {
            policy,
            host: host.into(),
        }
    }

    /// Active policy
    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Host identity used for profile lookups
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Select for the aligned path.
    pub fn select<'k, F: Copy>(
        &self,
        kernel: &'k Kernel<F>,
        capabilities: &CapabilitySet,
        profile: Option<&Profile>,
    ) -> &'k Implementation<F> {
        self.select_for(kernel, capabilities, profile, MemoryPath::Aligned)
    }

    /// Select for an explicit path.
    pub fn select_for<'k, F: Copy>(
        &self,
        kernel: &'k Kernel<F>,
        capabilities: &CapabilitySet,
        profile: Option<&Profile>,
        path: MemoryPath,
    ) -> &'k Implementation<F> {
        if self.policy.force_generic {
            return kernel.generic();
        }

        let capabilities = self.policy.effective_capabilities(capabilities);

        if let Some(preferred) = profile.and_then(|p| p.preferred(kernel.name(), &self.host, path)) {
            match kernel.find(preferred) {
                Some(imp) if !capabilities.satisfies(imp.info.requires) => log::warn!(
                    "Ignoring profile choice {} for {}: requires unavailable tags",
                    preferred,
                    kernel.name()
                ),
                Some(imp) if !path.admits(imp.info.alignment) => log::warn!(
                    "Ignoring profile choice {} for {}: not usable on the {} path",
                    preferred,
                    kernel.name(),
                    path
                ),
                Some(imp) => return imp,
                None => log::warn!(
                    "Ignoring profile choice {} for {}: no such implementation",
                    preferred,
                    kernel.name()
                ),
            }
        }

        kernel
            .ranked(&self.policy.priority_overrides)
            .into_iter()
            .find(|imp| capabilities.satisfies(imp.info.requires) && path.admits(imp.info.alignment))
            .unwrap_or_else(|| kernel.generic())
    }
}
