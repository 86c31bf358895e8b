//! Static per-kernel implementation tables.
//!
//! Every kernel owns a `'static` slice of [`Implementation`]s declared at
//! compile time. [`Kernel::new`] is a `const fn` that rejects tables without
//! exactly one zero-requirement implementation, so a kernel that could fail
//! to select on some host does not build.

use crate::system::ArchTag;
use std::collections::BTreeMap;
use std::fmt;

/// Memory alignment an implementation needs from every pointer argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alignment {
    /// Any address is acceptable
    None,
    /// Every pointer must be a multiple of the boundary (bytes, power of two)
    Aligned(usize),
}

impl Alignment {
    /// Boundary in bytes, or `None` for unaligned implementations
    pub const fn boundary(self) -> Option<usize> {
        match self {
            Alignment::None => None,
            Alignment::Aligned(n) => Some(n),
        }
    }

    /// Bit mask an address must clear, zero when unconstrained
    pub const fn mask(self) -> usize {
        match self {
            Alignment::None => 0,
            Alignment::Aligned(n) => n - 1,
        }
    }

    /// Check an address (or the OR of several addresses)
    #[inline]
    pub const fn is_satisfied_by(self, addr_bits: usize) -> bool {
        addr_bits & self.mask() == 0
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::None => f.write_str("none"),
            Alignment::Aligned(n) => write!(f, "{}-byte", n),
        }
    }
}

/// Descriptor of one implementation, independent of its function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplInfo {
    /// Unique name within the kernel, e.g. `a_avx_fma`
    pub name: &'static str,
    /// Tags that must all be present on the host
    pub requires: &'static [ArchTag],
    /// Pointer alignment the implementation assumes
    pub alignment: Alignment,
    /// Declared preference among siblings, higher first
    pub priority: i32,
}

impl ImplInfo {
    /// Declare an implementation descriptor
    pub const fn new(
        name: &'static str,
        requires: &'static [ArchTag],
        alignment: Alignment,
        priority: i32,
    ) -> Self {
        if let Alignment::Aligned(n) = alignment {
            assert!(n.is_power_of_two(), "alignment boundary must be a power of two");
        }
        Self {
            name,
            requires,
            alignment,
            priority,
        }
    }

    /// True for the implementation of last resort
    pub const fn is_generic(&self) -> bool {
        self.requires.is_empty()
    }
}

/// A named callable variant of a kernel.
#[derive(Debug, Clone, Copy)]
pub struct Implementation<F> {
    /// Descriptor
    pub info: ImplInfo,
    /// Entry point
    pub func: F,
}

impl<F> Implementation<F> {
    /// Pair a descriptor with its entry point
    pub const fn new(info: ImplInfo, func: F) -> Self {
        Self { info, func }
    }

    /// Implementation name
    pub fn name(&self) -> &'static str {
        self.info.name
    }
}

/// A logical operation and its registered implementations.
#[derive(Debug)]
pub struct Kernel<F: 'static> {
    name: &'static str,
    implementations: &'static [Implementation<F>],
    generic_index: usize,
}

impl<F: Copy + 'static> Kernel<F> {
    /// Build a kernel table.
    ///
    /// Fails const evaluation unless exactly one implementation has an empty
    /// requirement set and that implementation accepts unaligned pointers.
    pub const fn new(name: &'static str, implementations: &'static [Implementation<F>]) -> Self {
        let mut generic_index = usize::MAX;
        let mut i = 0;
        while i < implementations.len() {
            if implementations[i].info.requires.is_empty() {
                assert!(
                    generic_index == usize::MAX,
                    "kernel declares more than one zero-requirement implementation"
                );
                generic_index = i;
            }
            i += 1;
        }
        assert!(
            generic_index != usize::MAX,
            "kernel declares no zero-requirement implementation"
        );
        assert!(
            matches!(implementations[generic_index].info.alignment, Alignment::None),
            "zero-requirement implementation must accept unaligned pointers"
        );
        Self {
            name,
            implementations,
            generic_index,
        }
    }

    /// Kernel name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Implementations in declaration order
    pub fn implementations(&self) -> &'static [Implementation<F>] {
        self.implementations
    }

    /// The zero-requirement implementation
    pub fn generic(&self) -> &'static Implementation<F> {
        &self.implementations[self.generic_index]
    }

    /// Look up an implementation by name
    pub fn find(&self, name: &str) -> Option<&'static Implementation<F>> {
        self.implementations.iter().find(|imp| imp.info.name == name)
    }

    /// Implementations ordered by preference, highest first.
    ///
    /// `overrides` replaces declared priorities by implementation name.
    /// Equal priorities keep declaration order and the generic
    /// implementation is always last.
    pub fn ranked(&self, overrides: &BTreeMap<String, i32>) -> Vec<&'static Implementation<F>> {
        let priority = |imp: &Implementation<F>| {
            overrides
                .get(imp.info.name)
                .copied()
                .unwrap_or(imp.info.priority)
        };

        let mut ranked: Vec<&'static Implementation<F>> = self
            .implementations
            .iter()
            .filter(|imp| !imp.info.is_generic())
            .collect();
        // sort_by is stable
        ranked.sort_by(|a, b| priority(b).cmp(&priority(a)));
        ranked.push(self.generic());
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestFn = fn() -> u32;

    fn one() -> u32 {
        1
    }
    fn two() -> u32 {
        2
    }
    fn three() -> u32 {
        3
    }
    fn four() -> u32 {
        4
    }

    const TEST_IMPLS: &[Implementation<TestFn>] = &[
        Implementation::new(ImplInfo::new("generic", &[], Alignment::None, 100), one),
        Implementation::new(
            ImplInfo::new("a_avx", &[ArchTag::AVX], Alignment::Aligned(32), 20),
            two,
        ),
        Implementation::new(
            ImplInfo::new("u_avx", &[ArchTag::AVX], Alignment::None, 20),
            three,
        ),
        Implementation::new(
            ImplInfo::new("u_sse3", &[ArchTag::SSE3], Alignment::None, 10),
            four,
        ),
    ];

    static TEST_KERNEL: Kernel<TestFn> = Kernel::new("test_kernel", TEST_IMPLS);

    fn names(list: &[&Implementation<TestFn>]) -> Vec<&'static str> {
        list.iter().map(|imp| imp.name()).collect()
    }

    #[test]
    fn test_generic_lookup() {
        assert_eq!(TEST_KERNEL.name(), "test_kernel");
        assert_eq!(TEST_KERNEL.generic().name(), "generic");
        assert_eq!((TEST_KERNEL.generic().func)(), 1);
        assert!(TEST_KERNEL.generic().info.is_generic());
    }

    #[test]
    fn test_find() {
        assert_eq!(TEST_KERNEL.find("u_avx").map(|imp| (imp.func)()), Some(3));
        assert!(TEST_KERNEL.find("a_neon").is_none());
    }

    #[test]
    fn test_ranked_generic_last_and_stable() {
        let ranked = TEST_KERNEL.ranked(&BTreeMap::new());
        // generic declares the highest priority but still ranks last
        assert_eq!(names(&ranked), vec!["a_avx", "u_avx", "u_sse3", "generic"]);
    }

    #[test]
    fn test_ranked_with_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("u_sse3".to_string(), 50);
        overrides.insert("generic".to_string(), 1000);
        let ranked = TEST_KERNEL.ranked(&overrides);
        assert_eq!(names(&ranked), vec!["u_sse3", "a_avx", "u_avx", "generic"]);
    }

    #[test]
    fn test_alignment() {
        assert_eq!(Alignment::None.mask(), 0);
        assert_eq!(Alignment::Aligned(32).mask(), 31);
        assert_eq!(Alignment::Aligned(16).boundary(), Some(16));
        assert_eq!(Alignment::None.boundary(), None);
        assert!(Alignment::Aligned(16).is_satisfied_by(0x1000));
        assert!(!Alignment::Aligned(16).is_satisfied_by(0x1008));
        assert!(Alignment::None.is_satisfied_by(0x1003));
        assert_eq!(Alignment::Aligned(32).to_string(), "32-byte");
    }
}
