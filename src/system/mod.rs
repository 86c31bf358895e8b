//! # System Integration
//!
//! Host capability detection and machine identity.

pub mod cpu_features;

pub use cpu_features::{
    host_capabilities, host_identity, ArchTag, CapabilityProbe, CapabilitySet, FixedProbe,
    HostProbe,
};
