//! # Kernels
//!
//! Every kernel module declares a static implementation table, a
//! [`Dispatcher`] and a public entry point with the kernel's signature.
//! [`registered`] lists them as type-erased [`KernelEntry`] values for the
//! profiler and for capability reporting.

use crate::dispatch::{Dispatcher, ImplInfo, Kernel};
use crate::error::{Result, VkernError};
use crate::profile::{BenchmarkResults, MicroBenchmark};
use crate::system::host_capabilities;
use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub mod deinterleave_real_16i;
pub mod dot_prod_32fc;
mod scalar;

pub use deinterleave_real_16i::{
    deinterleave_real_16i, deinterleave_real_16i_manual, DeinterleaveFn,
};
pub use dot_prod_32fc::{dot_prod_32fc, dot_prod_32fc_manual, DotProdFn};

/// Function-pointer type of a kernel, with the data needed to run it
/// outside the public entry point.
pub trait KernelFn: Copy + Send + Sync + 'static {
    /// Buffers for one representative invocation
    type Workload;
    /// Value compared across implementations
    type Output;

    /// Deterministic workload of `num_points` samples, aligned for every
    /// registered implementation
    fn workload(num_points: usize) -> Self::Workload;

    /// Run this implementation over `workload`.
    ///
    /// # Safety
    ///
    /// The host must support every tag the implementation requires.
    unsafe fn execute(self, workload: &mut Self::Workload);

    /// Result of the last [`KernelFn::execute`]
    fn output(workload: &Self::Workload) -> Self::Output;

    /// Whether `candidate` is within `tolerance` per sample of `reference`
    fn agrees(
        reference: &Self::Output,
        candidate: &Self::Output,
        num_points: usize,
        tolerance: f32,
    ) -> bool;
}

/// Type-erased view of a registered kernel.
pub trait KernelEntry: Sync {
    /// Kernel name
    fn name(&self) -> &'static str;

    /// Implementation descriptors in declaration order
    fn implementations(&self) -> Vec<ImplInfo>;

    /// Implementations bound for the aligned and unaligned paths,
    /// binding first if needed
    fn active(&self) -> (ImplInfo, ImplInfo);

    /// True once the dispatcher has resolved its binding
    fn is_bound(&self) -> bool;

    /// Run `implementation` and the generic implementation on the same
    /// workload and compare their outputs
    fn verify(&self, implementation: &str, num_points: usize, tolerance: f32) -> Result<bool>;

    /// Time `implementation` on a workload of `num_points` samples
    fn benchmark(
        &self,
        implementation: &str,
        num_points: usize,
        bench: &MicroBenchmark,
    ) -> Result<BenchmarkResults>;
}

impl std::fmt::Debug for dyn KernelEntry + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelEntry").field("name", &self.name()).finish()
    }
}

/// [`KernelEntry`] backed by a static dispatcher
pub struct RegisteredKernel<F: 'static> {
    dispatcher: &'static Dispatcher<F>,
}

impl<F: KernelFn> RegisteredKernel<F> {
    /// Wrap a dispatcher
    pub const fn new(dispatcher: &'static Dispatcher<F>) -> Self {
        Self { dispatcher }
    }

    fn runnable(&self, implementation: &str) -> Result<F> {
        let kernel = self.dispatcher.kernel();
        let imp = kernel
            .find(implementation)
            .ok_or_else(|| VkernError::unknown_implementation(kernel.name(), implementation))?;
        require_host_support(&imp.info)?;
        Ok(imp.func)
    }
}

impl<F: KernelFn> KernelEntry for RegisteredKernel<F> {
    fn name(&self) -> &'static str {
        self.dispatcher.kernel().name()
    }

    fn implementations(&self) -> Vec<ImplInfo> {
        self.dispatcher
            .kernel()
            .implementations()
            .iter()
            .map(|imp| imp.info)
            .collect()
    }

    fn active(&self) -> (ImplInfo, ImplInfo) {
        let binding = self.dispatcher.binding();
        (binding.aligned().info, binding.unaligned().info)
    }

    fn is_bound(&self) -> bool {
        self.dispatcher.is_bound()
    }

    fn verify(&self, implementation: &str, num_points: usize, tolerance: f32) -> Result<bool> {
        let candidate = self.runnable(implementation)?;
        let generic = self.dispatcher.kernel().generic().func;

        let mut expected = F::workload(num_points);
        let mut actual = F::workload(num_points);
        // runnable() checked host support; workloads are aligned for every
        // implementation
        unsafe {
            generic.execute(&mut expected);
            candidate.execute(&mut actual);
        }
        Ok(F::agrees(
            &F::output(&expected),
            &F::output(&actual),
            num_points,
            tolerance,
        ))
    }

    fn benchmark(
        &self,
        implementation: &str,
        num_points: usize,
        bench: &MicroBenchmark,
    ) -> Result<BenchmarkResults> {
        let func = self.runnable(implementation)?;
        let mut workload = F::workload(num_points);
        // runnable() checked host support
        bench.run(|| unsafe { func.execute(std::hint::black_box(&mut workload)) })
    }
}

static DOT_PROD_32FC: RegisteredKernel<DotProdFn> =
    RegisteredKernel::new(&dot_prod_32fc::DISPATCHER);
static DEINTERLEAVE_REAL_16I: RegisteredKernel<DeinterleaveFn> =
    RegisteredKernel::new(&deinterleave_real_16i::DISPATCHER);

static REGISTERED: [&dyn KernelEntry; 2] = [&DOT_PROD_32FC, &DEINTERLEAVE_REAL_16I];

/// Every kernel in the library
pub fn registered() -> &'static [&'static dyn KernelEntry] {
    &REGISTERED
}

/// Look up a kernel by name
pub fn find_kernel(name: &str) -> Result<&'static dyn KernelEntry> {
    registered()
        .iter()
        .copied()
        .find(|entry| entry.name() == name)
        .ok_or_else(|| VkernError::unknown_kernel(name))
}

/// Fail unless the host supports every tag `info` requires
fn require_host_support(info: &ImplInfo) -> Result<()> {
    if host_capabilities().satisfies(info.requires) {
        return Ok(());
    }
    let missing: Vec<&str> = info
        .requires
        .iter()
        .filter(|tag| !host_capabilities().contains(**tag))
        .map(|tag| tag.name())
        .collect();
    Err(VkernError::not_supported(format!(
        "{} requires {}",
        info.name,
        missing.join(", ")
    )))
}

/// Entry point of a named implementation, checked for existence, host
/// support and the alignment of `addr_bits`
pub(crate) fn checked_implementation<F: Copy + 'static>(
    kernel: &'static Kernel<F>,
    name: &str,
    addr_bits: usize,
) -> Result<F> {
    let imp = kernel
        .find(name)
        .ok_or_else(|| VkernError::unknown_implementation(kernel.name(), name))?;
    require_host_support(&imp.info)?;
    if !imp.info.alignment.is_satisfied_by(addr_bits) {
        return Err(VkernError::misaligned(
            name,
            imp.info.alignment.boundary().unwrap_or(1),
        ));
    }
    Ok(imp.func)
}

/// OR of the pointer addresses, or zero when no element is touched
#[inline]
pub(crate) fn address_bits(ptrs: &[*const u8], len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ptrs.iter().fold(0, |bits, p| bits | *p as usize)
}

/// Deterministic complex samples with both parts in `[-1, 1)`
pub fn random_complex(len: usize, seed: u64) -> Vec<Complex32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| Complex32::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect()
}
