//! Resolved bindings and the per-kernel dispatcher.
//!
//! A [`Binding`] holds the implementation chosen for each memory path. The
//! [`Dispatcher`] resolves it once through a `OnceLock` and afterwards only
//! performs the alignment test on every call.

use super::registry::{ImplInfo, Implementation, Kernel};
use super::selector::{MemoryPath, SelectionPolicy, Selector};
use crate::config::{DispatchConfig, ENV_PREFIX};
use crate::profile::Profile;
use crate::system::{host_capabilities, CapabilityProbe, CapabilitySet};
use std::sync::OnceLock;

/// Implementations bound for one kernel.
#[derive(Debug, Clone, Copy)]
pub struct Binding<F: 'static> {
    kernel: &'static str,
    aligned: &'static Implementation<F>,
    unaligned: &'static Implementation<F>,
    align_mask: usize,
}

impl<F: Copy + 'static> Binding<F> {
    /// Resolve both paths against a dispatch context.
    pub fn resolve(kernel: &'static Kernel<F>, context: &DispatchContext) -> Self {
        // context capabilities are always a subset of the host's
        unsafe {
            Self::resolve_with(
                kernel,
                context.selector(),
                context.capabilities(),
                context.profile(),
            )
        }
    }

    /// Resolve both paths against arbitrary inputs.
    ///
    /// # Safety
    ///
    /// Calling the functions this binding routes to executes instructions
    /// from every tag in `capabilities`. The caller must ensure the host
    /// supports them before invoking anything returned by [`Binding::route`].
    pub unsafe fn resolve_with(
        kernel: &'static Kernel<F>,
        selector: &Selector,
        capabilities: &CapabilitySet,
        profile: Option<&Profile>,
    ) -> Self {
        let aligned = selector.select_for(kernel, capabilities, profile, MemoryPath::Aligned);
        let unaligned = selector.select_for(kernel, capabilities, profile, MemoryPath::Unaligned);
        Self {
            kernel: kernel.name(),
            aligned,
            unaligned,
            align_mask: aligned.info.alignment.mask(),
        }
    }

    /// Entry point for a call whose pointer addresses OR to `addr_bits`
    #[inline(always)]
    pub fn route(&self, addr_bits: usize) -> F {
        if addr_bits & self.align_mask == 0 {
            self.aligned.func
        } else {
            self.unaligned.func
        }
    }

    /// Descriptor of the implementation [`Binding::route`] would pick
    pub fn route_info(&self, addr_bits: usize) -> &'static ImplInfo {
        if addr_bits & self.align_mask == 0 {
            &self.aligned.info
        } else {
            &self.unaligned.info
        }
    }

    /// Kernel name
    pub fn kernel(&self) -> &'static str {
        self.kernel
    }

    /// Implementation used when every pointer is aligned
    pub fn aligned(&self) -> &'static Implementation<F> {
        self.aligned
    }

    /// Implementation used otherwise
    pub fn unaligned(&self) -> &'static Implementation<F> {
        self.unaligned
    }

    /// Boundary the aligned path needs, `None` when it needs none
    pub fn alignment_boundary(&self) -> Option<usize> {
        self.aligned.info.alignment.boundary()
    }
}

/// Inputs shared by every binding resolution in a process.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    capabilities: CapabilitySet,
    selector: Selector,
    profile: Option<Profile>,
}

static GLOBAL_CONTEXT: OnceLock<DispatchContext> = OnceLock::new();

impl DispatchContext {
    /// Process-wide context built from `VKERN_*` environment variables.
    ///
    /// Invalid entries are skipped one by one; see
    /// [`DispatchConfig::from_env_lenient`].
    pub fn global() -> &'static DispatchContext {
        GLOBAL_CONTEXT.get_or_init(|| {
            Self::from_config(&DispatchConfig::from_env_lenient(ENV_PREFIX))
        })
    }

    /// Context for a configuration, reading its profile if enabled
    pub fn from_config(config: &DispatchConfig) -> Self {
        let profile = config.resolved_profile_path().map(Profile::load_or_default);
        Self {
            capabilities: host_capabilities().clone(),
            selector: Selector::new(SelectionPolicy::from_config(config)),
            profile,
        }
    }

    /// Context whose capabilities come from `detector` instead of the
    /// host query. Tags the host lacks are dropped.
    pub fn from_detector(config: &DispatchConfig, detector: &dyn CapabilityProbe) -> Self {
        let detected = detector.detect();
        log::debug!("Dispatch capabilities from detector: {}", detected);
        Self::from_config(config).with_capabilities(&detected)
    }

    /// Restrict capabilities; the result never exceeds the host's
    pub fn with_capabilities(mut self, capabilities: &CapabilitySet) -> Self {
        self.capabilities = capabilities.intersection(host_capabilities());
        self
    }

    /// Replace the profile
    pub fn with_profile(mut self, profile: Option<Profile>) -> Self {
        self.profile = profile;
        self
    }

    /// Replace the selector
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Capabilities selection runs against
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Selector
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Loaded profile, if any
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Resolve a binding for `kernel`
    pub fn bind<F: Copy + 'static>(&self, kernel: &'static Kernel<F>) -> Binding<F> {
        Binding::resolve(kernel, self)
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::static_priority())
    }
}

/// Public entry point state for one kernel.
pub struct Dispatcher<F: 'static> {
    kernel: &'static Kernel<F>,
    binding: OnceLock<Binding<F>>,
}

impl<F: Copy + 'static> Dispatcher<F> {
    /// Unbound dispatcher
    pub const fn new(kernel: &'static Kernel<F>) -> Self {
        Self {
            kernel,
            binding: OnceLock::new(),
        }
    }

    /// Kernel table
    pub fn kernel(&self) -> &'static Kernel<F> {
        self.kernel
    }

    /// Current binding, resolving it against the global context on first use
    #[inline]
    pub fn binding(&self) -> &Binding<F> {
        self.binding.get_or_init(|| {
            let binding = DispatchContext::global().bind(self.kernel);
            log::debug!(
                "Bound {}: aligned={} unaligned={}",
                binding.kernel(),
                binding.aligned().name(),
                binding.unaligned().name()
            );
            binding
        })
    }

    /// True once the binding has been resolved
    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }
}
