//! # Architecture Dispatch
//!
//! Runtime selection among the implementations compiled into each kernel.
//!
//! ## Components
//!
//! - [`registry`]: static implementation tables ([`Kernel`], [`Implementation`])
//! - [`selector`]: the selection algorithm ([`Selector`], [`SelectionPolicy`])
//! - [`binding`]: resolved choices and per-call alignment routing
//!   ([`Binding`], [`Dispatcher`], [`DispatchContext`])
//!
//! ## Lifecycle
//!
//! Host capabilities are detected once. The first call to a kernel resolves
//! its binding against the process-wide [`DispatchContext`]; later calls
//! only test pointer alignment to pick the aligned or unaligned entry point.

pub mod binding;
pub mod registry;
pub mod selector;

pub use binding::{Binding, DispatchContext, Dispatcher};
pub use registry::{Alignment, ImplInfo, Implementation, Kernel};
pub use selector::{MemoryPath, SelectionPolicy, Selector};
