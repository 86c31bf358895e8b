//! Offline profiler.
//!
//! Benchmarks every implementation the host can run, skips candidates that
//! disagree with the generic implementation and records the fastest
//! implementation per memory path.

use super::benchmarks::{BenchmarkResults, MicroBenchmark};
use super::{Profile, ProfileEntry};
use crate::config::{Config, ProfilerConfig};
use crate::dispatch::{Alignment, MemoryPath};
use crate::error::{Result, VkernError};
use crate::kernels::{self, KernelEntry};
use crate::system::{host_capabilities, host_identity, CapabilityProbe, CapabilitySet};
use rayon::prelude::*;
use std::path::Path;

/// Timing of one implementation
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Implementation name
    pub implementation: &'static str,
    /// Alignment the implementation needs
    pub alignment: Alignment,
    /// Timing statistics
    pub results: BenchmarkResults,
}

/// Profiling outcome for one kernel
#[derive(Debug, Clone)]
pub struct KernelProfile {
    /// Kernel name
    pub kernel: &'static str,
    /// Winners to persist
    pub entry: ProfileEntry,
    /// Every timed implementation in declaration order
    pub measurements: Vec<Measurement>,
    /// Implementations whose output disagreed with generic
    pub rejected: Vec<&'static str>,
}

impl KernelProfile {
    /// Measurement for an implementation
    pub fn measurement(&self, implementation: &str) -> Option<&Measurement> {
        self.measurements
            .iter()
            .find(|m| m.implementation == implementation)
    }
}

/// Benchmarks kernels and produces profile entries
#[derive(Debug, Clone)]
pub struct Profiler {
    config: ProfilerConfig,
    capabilities: CapabilitySet,
    host: String,
}

impl Profiler {
    /// Profiler for the current host
    pub fn new(config: ProfilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            capabilities: host_capabilities().clone(),
            host: host_identity().to_string(),
        })
    }

    /// Only consider implementations within `capabilities` (clamped to the
    /// host)
    pub fn with_capabilities(mut self, capabilities: &CapabilitySet) -> Self {
        self.capabilities = capabilities.intersection(host_capabilities());
        self
    }

    /// Draw candidates from what `detector` reports, clamped to the host
    pub fn with_detector(self, detector: &dyn CapabilityProbe) -> Self {
        self.with_capabilities(&detector.detect())
    }

    /// Record entries under another host identity
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Measurement parameters
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Capabilities candidates are drawn from
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Host identity entries are recorded under
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Benchmark every eligible implementation of `kernel`
    pub fn profile_kernel(&self, kernel: &dyn KernelEntry) -> Result<KernelProfile> {
        let bench = MicroBenchmark::from_config(&self.config);
        let num_points = self.config.num_points;
        let mut measurements = Vec::new();
        let mut rejected = Vec::new();

        for info in kernel.implementations() {
            if !self.capabilities.satisfies(info.requires) {
                log::debug!("{}: skipping {} (unsupported)", kernel.name(), info.name);
                continue;
            }
            if self.config.verify
                && !info.is_generic()
                && !kernel.verify(info.name, num_points, self.config.tolerance)?
            {
                log::warn!(
                    "{}: {} disagrees with generic, not considered",
                    kernel.name(),
                    info.name
                );
                rejected.push(info.name);
                continue;
            }

            let results = kernel.benchmark(info.name, num_points, &bench)?;
            log::debug!(
                "{}: {} median {:?} ({:.3e} points/s)",
                kernel.name(),
                info.name,
                results.median_latency,
                results.points_per_second(num_points)
            );
            measurements.push(Measurement {
                implementation: info.name,
                alignment: info.alignment,
                results,
            });
        }

        let fastest = |path: MemoryPath| {
            measurements
                .iter()
                .filter(|m| path.admits(m.alignment))
                .min_by_key(|m| m.results.median_latency)
                .map(|m| m.implementation)
                .ok_or_else(|| {
                    VkernError::profile(format!(
                        "{}: no implementation measured for the {} path",
                        kernel.name(),
                        path
                    ))
                })
        };
        let aligned = fastest(MemoryPath::Aligned)?;
        let unaligned = fastest(MemoryPath::Unaligned)?;

        log::info!(
            "{}: fastest aligned={} unaligned={}",
            kernel.name(),
            aligned,
            unaligned
        );

        Ok(KernelProfile {
            kernel: kernel.name(),
            entry: ProfileEntry::new(kernel.name(), self.host.clone(), aligned, unaligned),
            measurements,
            rejected,
        })
    }

    /// Profile several kernels, on the rayon pool when configured
    pub fn profile_all(&self, kernels: &[&dyn KernelEntry]) -> Result<Profile> {
        let outcomes: Vec<Result<KernelProfile>> = if self.config.parallel {
            kernels
                .par_iter()
                .map(|kernel| self.profile_kernel(*kernel))
                .collect()
        } else {
            kernels
                .iter()
                .map(|kernel| self.profile_kernel(*kernel))
                .collect()
        };

        let mut profile = Profile::new();
        for outcome in outcomes {
            profile.insert(outcome?.entry);
        }
        Ok(profile)
    }

    /// Profile every registered kernel
    pub fn profile_registered(&self) -> Result<Profile> {
        self.profile_all(kernels::registered())
    }

    /// Profile every registered kernel and merge the result into the profile
    /// file at `path`
    pub fn update_file<P: AsRef<Path>>(&self, path: P) -> Result<Profile> {
        let path = path.as_ref();
        let measured = self.profile_registered()?;
        let mut profile = Profile::load(path).unwrap_or_else(|e| {
            log::warn!("Replacing unreadable profile {}: {}", path.display(), e);
            Profile::new()
        });
        profile.merge(measured);
        profile.save(path)?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::find_kernel;
    use crate::system::{ArchTag, FixedProbe};

    fn quick() -> ProfilerConfig {
        ProfilerConfig {
            warmup_iterations: 1,
            measurement_iterations: 3,
            num_points: 515,
            ..ProfilerConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ProfilerConfig {
            measurement_iterations: 0,
            ..ProfilerConfig::default()
        };
        assert!(Profiler::new(config).is_err());
    }

    #[test]
    fn test_profile_kernel_picks_supported_winners() {
        let profiler = Profiler::new(quick()).unwrap().with_host("test-host");
        let kernel = find_kernel("dot_prod_32fc").unwrap();
        let outcome = profiler.profile_kernel(kernel).unwrap();

        assert_eq!(outcome.kernel, "dot_prod_32fc");
        assert_eq!(outcome.entry.host, "test-host");
        assert!(outcome.rejected.is_empty());
        assert!(outcome.measurement("generic").is_some());

        let aligned = outcome.measurement(&outcome.entry.aligned).unwrap();
        let unaligned = outcome.measurement(&outcome.entry.unaligned).unwrap();
        assert_eq!(unaligned.alignment, Alignment::None);
        for m in &outcome.measurements {
            assert!(aligned.results.median_latency <= m.results.median_latency);
        }
    }

    #[test]
    fn test_empty_capabilities_profile_generic() {
        let profiler = Profiler::new(quick())
            .unwrap()
            .with_detector(&FixedProbe(CapabilitySet::new()));
        assert!(profiler.capabilities().is_empty());
        let kernel = find_kernel("deinterleave_real_16i").unwrap();
        let outcome = profiler.profile_kernel(kernel).unwrap();
        assert_eq!(outcome.measurements.len(), 1);
        assert_eq!(outcome.entry.aligned, "generic");
        assert_eq!(outcome.entry.unaligned, "generic");
    }

    #[test]
    fn test_detector_cannot_exceed_host() {
        let mut inflated = host_capabilities().clone();
        inflated.insert(ArchTag::custom("fake_simd"));
        let profiler = Profiler::new(quick())
            .unwrap()
            .with_detector(&FixedProbe(inflated));
        assert_eq!(profiler.capabilities(), host_capabilities());
    }

    #[test]
    fn test_profile_all_sequential_and_parallel() {
        for parallel in [false, true] {
            let config = ProfilerConfig {
                parallel,
                ..quick()
            };
            let profiler = Profiler::new(config).unwrap().with_host("test-host");
            let profile = profiler.profile_registered().unwrap();
            assert_eq!(profile.len(), kernels::registered().len());
            for kernel in kernels::registered() {
                assert!(profile.lookup(kernel.name(), "test-host").is_some());
            }
        }
    }
}
