//! # vkern: Vector Kernels with Runtime Architecture Dispatch
//!
//! Numeric kernels that ship several interchangeable implementations each,
//! one per instruction-set extension and memory-alignment contract, and pick
//! the best one the host can run.
//!
//! ## Key Features
//!
//! - **Capability probing**: host instruction-set extensions detected once
//!   per process
//! - **Static registries**: every kernel carries a compile-time checked table
//!   with exactly one generic fallback
//! - **Deterministic selection**: declared priorities, configurable overrides
//!   and an optional empirical profile
//! - **Alignment routing**: aligned and unaligned entry points chosen per
//!   call from the buffer addresses
//! - **Offline profiler**: benchmarks eligible implementations and persists
//!   the winners
//!
//! ## Quick Start
//!
//! ```rust
//! use num_complex::Complex32;
//! use vkern::{capabilities, dot_prod_32fc};
//!
//! println!("Host supports: {}", capabilities());
//!
//! let input = vec![Complex32::new(1.0, 1.0); 16];
//! let taps = vec![Complex32::new(0.5, 0.0); 16];
//! let result = dot_prod_32fc(&input, &taps);
//! assert!((result - Complex32::new(8.0, 8.0)).norm() < 1e-4);
//! ```
//!
//! ## Environment
//!
//! - `VKERN_GENERIC=1` binds generic implementations only
//! - `VKERN_DISABLE_ARCH=avx2,fma` masks tags before selection
//! - `VKERN_PRIORITY=a_avx=90` overrides declared priorities
//! - `VKERN_USE_PROFILE=0` ignores the persisted profile
//! - `VKERN_PROFILE_PATH=/path/profile.json` relocates it

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod kernels;
pub mod memory;
pub mod profile;
pub mod system;

pub use config::{Config, DispatchConfig, ProfilerConfig};
pub use dispatch::{
    Alignment, Binding, DispatchContext, Dispatcher, ImplInfo, Implementation, Kernel,
    MemoryPath, SelectionPolicy, Selector,
};
pub use error::{Result, VkernError};
pub use kernels::{
    deinterleave_real_16i, deinterleave_real_16i_manual, dot_prod_32fc, dot_prod_32fc_manual,
    find_kernel, registered, KernelEntry,
};
pub use memory::AlignedVec;
pub use profile::{Profile, ProfileEntry, Profiler};
pub use system::{host_identity, ArchTag, CapabilityProbe, CapabilitySet, FixedProbe, HostProbe};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capabilities detected on the host
pub fn capabilities() -> &'static CapabilitySet {
    system::host_capabilities()
}

/// Largest alignment boundary any bound aligned path expects.
///
/// Buffers aligned to this value take the aligned path of every kernel.
pub fn alignment() -> usize {
    kernels::registered()
        .iter()
        .filter_map(|kernel| kernel.active().0.alignment.boundary())
        .max()
        .unwrap_or(1)
}

/// Bind every registered kernel now.
///
/// Binding otherwise happens on the first call of each kernel; calling this
/// at startup moves profile I/O out of the first kernel call.
pub fn init() {
    log::debug!("Initializing vkern v{} on {}", VERSION, host_identity());
    for kernel in kernels::registered() {
        let (aligned, unaligned) = kernel.active();
        log::debug!(
            "{}: aligned={} unaligned={}",
            kernel.name(),
            aligned.name,
            unaligned.name
        );
    }
}
