//! # CPU Capability Detection
//!
//! Runtime detection of the instruction-set extensions the host supports,
//! expressed as a set of named architecture tags. Detection runs once per
//! process; every later query reads the published result.
//!
//! A tag whose detection primitive is unavailable on the current target is
//! reported as unsupported. Detection never fails.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

/// Identifier for an instruction-set extension an implementation depends on.
///
/// Tags are plain names and carry no implied ordering: an implementation that
/// needs AVX and FMA lists both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchTag(&'static str);

impl ArchTag {
    /// x86 SSE
    pub const SSE: ArchTag = ArchTag("sse");
    /// x86 SSE2
    pub const SSE2: ArchTag = ArchTag("sse2");
    /// x86 SSE3
    pub const SSE3: ArchTag = ArchTag("sse3");
    /// x86 SSSE3
    pub const SSSE3: ArchTag = ArchTag("ssse3");
    /// x86 SSE4.1
    pub const SSE4_1: ArchTag = ArchTag("sse4_1");
    /// x86 SSE4.2
    pub const SSE4_2: ArchTag = ArchTag("sse4_2");
    /// x86 AVX
    pub const AVX: ArchTag = ArchTag("avx");
    /// x86 AVX2
    pub const AVX2: ArchTag = ArchTag("avx2");
    /// x86 fused multiply-add (FMA3)
    pub const FMA: ArchTag = ArchTag("fma");
    /// x86 AVX-512 foundation
    pub const AVX512F: ArchTag = ArchTag("avx512f");
    /// x86 AVX-512 conflict detection
    pub const AVX512CD: ArchTag = ArchTag("avx512cd");
    /// ARM Advanced SIMD
    pub const NEON: ArchTag = ArchTag("neon");
    /// ARMv8 Advanced SIMD (AArch64 instruction forms)
    pub const NEONV8: ArchTag = ArchTag("neonv8");

    /// Every tag host detection knows how to report.
    pub const KNOWN: &'static [ArchTag] = &[
        ArchTag::SSE,
        ArchTag::SSE2,
        ArchTag::SSE3,
        ArchTag::SSSE3,
        ArchTag::SSE4_1,
        ArchTag::SSE4_2,
        ArchTag::AVX,
        ArchTag::AVX2,
        ArchTag::FMA,
        ArchTag::AVX512F,
        ArchTag::AVX512CD,
        ArchTag::NEON,
        ArchTag::NEONV8,
    ];

    /// Define a tag outside the built-in set.
    ///
    /// Host detection never reports custom tags; they enter a capability set
    /// only through an explicit [`CapabilitySet::insert`].
    pub const fn custom(name: &'static str) -> Self {
        ArchTag(name)
    }

    /// Tag name
    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Look up a built-in tag by name (case-insensitive).
    ///
    /// `sse4.1` and `sse4_1` spellings are both accepted.
    pub fn from_name(name: &str) -> Option<ArchTag> {
        let normalized = name.trim().to_lowercase().replace('.', "_");
        ArchTag::KNOWN
            .iter()
            .copied()
            .find(|tag| tag.0 == normalized)
    }
}

impl fmt::Display for ArchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Set of architecture tags supported by a host.
///
/// Ordered so iteration, display and anything derived from them are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    tags: BTreeSet<ArchTag>,
}

impl CapabilitySet {
    /// Empty set: only zero-requirement implementations are eligible
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from tags
    pub fn from_tags<I: IntoIterator<Item = ArchTag>>(tags: I) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }

    /// Add a tag
    pub fn insert(&mut self, tag: ArchTag) -> bool {
        self.tags.insert(tag)
    }

    /// Remove a tag
    pub fn remove(&mut self, tag: ArchTag) -> bool {
        self.tags.remove(&tag)
    }

    /// Check a single tag
    pub fn contains(&self, tag: ArchTag) -> bool {
        self.tags.contains(&tag)
    }

    /// True when every tag in `required` is present.
    ///
    /// An empty requirement is satisfied by every set.
    pub fn satisfies(&self, required: &[ArchTag]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }

    /// Tags present in both sets
    pub fn intersection(&self, other: &CapabilitySet) -> CapabilitySet {
        Self {
            tags: self.tags.intersection(&other.tags).copied().collect(),
        }
    }

    /// Copy of this set with `masked` tags removed
    pub fn without(&self, masked: &[ArchTag]) -> CapabilitySet {
        Self {
            tags: self
                .tags
                .iter()
                .copied()
                .filter(|tag| !masked.contains(tag))
                .collect(),
        }
    }

    /// True when every tag of `self` is also in `other`
    pub fn is_subset(&self, other: &CapabilitySet) -> bool {
        self.tags.is_subset(&other.tags)
    }

    /// Iterate tags in name order
    pub fn iter(&self) -> impl Iterator<Item = ArchTag> + '_ {
        self.tags.iter().copied()
    }

    /// Tag names in name order
    pub fn names(&self) -> Vec<&'static str> {
        self.tags.iter().map(|tag| tag.name()).collect()
    }

    /// Number of tags
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when no tag is present
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<ArchTag> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = ArchTag>>(iter: I) -> Self {
        Self::from_tags(iter)
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            return f.write_str("generic");
        }
        let mut first = true;
        for tag in &self.tags {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(tag.name())?;
            first = false;
        }
        Ok(())
    }
}

/// Source of a capability set
pub trait CapabilityProbe {
    /// Query the capabilities this source describes
    fn detect(&self) -> CapabilitySet;
}

/// Detection for the CPU the process runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl HostProbe {
    /// Create a new host detector
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_arch = "x86_64")]
    fn detect_x86_features(tags: &mut CapabilitySet) {
        macro_rules! detect {
            ($($feature:tt => $tag:expr),* $(,)?) => {
                $(
                    if std::arch::is_x86_feature_detected!($feature) {
                        tags.insert($tag);
                    }
                )*
            };
        }

        detect! {
            "sse" => ArchTag::SSE,
            "sse2" => ArchTag::SSE2,
            "sse3" => ArchTag::SSE3,
            "ssse3" => ArchTag::SSSE3,
            "sse4.1" => ArchTag::SSE4_1,
            "sse4.2" => ArchTag::SSE4_2,
            "avx" => ArchTag::AVX,
            "avx2" => ArchTag::AVX2,
            "fma" => ArchTag::FMA,
            "avx512f" => ArchTag::AVX512F,
            "avx512cd" => ArchTag::AVX512CD,
        }
    }

    #[cfg(target_arch = "aarch64")]
    fn detect_arm_features(tags: &mut CapabilitySet) {
        if std::arch::is_aarch64_feature_detected!("neon") {
            tags.insert(ArchTag::NEON);
            // AArch64 Advanced SIMD always has the v8 instruction forms
            tags.insert(ArchTag::NEONV8);
        }
    }
}

impl CapabilityProbe for HostProbe {
    fn detect(&self) -> CapabilitySet {
        #[allow(unused_mut)]
        let mut tags = CapabilitySet::new();

        #[cfg(target_arch = "x86_64")]
        Self::detect_x86_features(&mut tags);

        #[cfg(target_arch = "aarch64")]
        Self::detect_arm_features(&mut tags);

        tags
    }
}

/// Fixed capability set, for forcing a subset on a dispatch context or
/// profiler
#[derive(Debug, Clone, Default)]
pub struct FixedProbe(pub CapabilitySet);

impl CapabilityProbe for FixedProbe {
    fn detect(&self) -> CapabilitySet {
        self.0.clone()
    }
}

static HOST_CAPABILITIES: OnceLock<CapabilitySet> = OnceLock::new();
static HOST_IDENTITY: OnceLock<String> = OnceLock::new();

/// Get the host capability set (detected once on first call)
pub fn host_capabilities() -> &'static CapabilitySet {
    HOST_CAPABILITIES.get_or_init(|| {
        let caps = HostProbe::new().detect();
        log::debug!("Detected host capabilities: {}", caps);
        caps
    })
}

/// Machine identity used to key profile entries.
///
/// Combines the target architecture with CPU vendor and brand string so a
/// profile copied between machines is not applied to the wrong CPU.
pub fn host_identity() -> &'static str {
    HOST_IDENTITY.get_or_init(|| {
        let (vendor, model) = cpu_info();
        format!("{}:{}:{}", std::env::consts::ARCH, vendor, model)
    })
}

/// CPU vendor and model strings
fn cpu_info() -> (String, String) {
    #[cfg(target_arch = "x86_64")]
    {
        let cpuid = raw_cpuid::CpuId::new();
        let vendor = cpuid
            .get_vendor_info()
            .map(|v| v.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let model = cpuid
            .get_processor_brand_string()
            .map(|b| b.as_str().trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        (vendor, model)
    }

    #[cfg(target_arch = "aarch64")]
    {
        let mut vendor = "arm".to_string();
        let mut model = "unknown".to_string();
        if let Ok(cpuinfo) = std::fs::read_to_string("/proc/cpuinfo") {
            for line in cpuinfo.lines() {
                if line.starts_with("CPU implementer") {
                    if line.contains("0x41") {
                        vendor = "arm".to_string();
                    } else if line.contains("0x51") {
                        vendor = "qualcomm".to_string();
                    } else if line.contains("0x61") {
                        vendor = "apple".to_string();
                    }
                } else if line.starts_with("model name") || line.starts_with("CPU part") {
                    if let Some(name) = line.split(':').nth(1) {
                        model = name.trim().to_string();
                    }
                }
            }
        }
        (vendor, model)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        ("unknown".to_string(), "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_detection_is_cached() {
        let first = host_capabilities();
        let second = host_capabilities();
        assert!(std::ptr::eq(first, second));
        println!("Host capabilities: {}", first);
    }

    #[test]
    fn test_host_tags_are_known() {
        for tag in host_capabilities().iter() {
            assert!(ArchTag::KNOWN.contains(&tag), "unexpected tag {}", tag);
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ArchTag::from_name("avx"), Some(ArchTag::AVX));
        assert_eq!(ArchTag::from_name(" FMA "), Some(ArchTag::FMA));
        assert_eq!(ArchTag::from_name("sse4.1"), Some(ArchTag::SSE4_1));
        assert_eq!(ArchTag::from_name("sse4_2"), Some(ArchTag::SSE4_2));
        assert_eq!(ArchTag::from_name("altivec"), None);
    }

    #[test]
    fn test_satisfies() {
        let caps = CapabilitySet::from_tags([ArchTag::AVX, ArchTag::FMA]);
        assert!(caps.satisfies(&[]));
        assert!(caps.satisfies(&[ArchTag::AVX]));
        assert!(caps.satisfies(&[ArchTag::AVX, ArchTag::FMA]));
        assert!(!caps.satisfies(&[ArchTag::AVX, ArchTag::AVX2]));
        assert!(CapabilitySet::new().satisfies(&[]));
        assert!(!CapabilitySet::new().satisfies(&[ArchTag::SSE]));
    }

    #[test]
    fn test_set_operations() {
        let a = CapabilitySet::from_tags([ArchTag::SSE3, ArchTag::AVX, ArchTag::FMA]);
        let b = CapabilitySet::from_tags([ArchTag::AVX, ArchTag::NEON]);

        let both = a.intersection(&b);
        assert_eq!(both.names(), vec!["avx"]);
        assert!(both.is_subset(&a));
        assert!(both.is_subset(&b));

        let masked = a.without(&[ArchTag::FMA]);
        assert!(!masked.contains(ArchTag::FMA));
        assert_eq!(masked.len(), 2);
    }

    #[test]
    fn test_custom_tags() {
        const VSX: ArchTag = ArchTag::custom("vsx");
        let mut caps = CapabilitySet::new();
        caps.insert(VSX);
        assert!(caps.satisfies(&[VSX]));
        assert_eq!(ArchTag::from_name("vsx"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(CapabilitySet::new().to_string(), "generic");
        let caps = CapabilitySet::from_tags([ArchTag::FMA, ArchTag::AVX]);
        assert_eq!(caps.to_string(), "avx, fma");
    }

    #[test]
    fn test_fixed_set_detects_itself() {
        let caps = CapabilitySet::from_tags([ArchTag::NEON]);
        let fixed = FixedProbe(caps.clone());
        assert_eq!(fixed.detect(), caps);
    }

    #[test]
    fn test_host_identity() {
        let id = host_identity();
        assert!(id.starts_with(std::env::consts::ARCH));
        assert_eq!(id.matches(':').count() >= 2, true);
    }
}
