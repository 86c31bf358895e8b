//! Error handling for the vkern library
//!
//! Dispatcher calls on the hot path never produce errors. These types cover
//! configuration loading, the profile store, the offline profiler and the
//! checked manual invocation path.

use thiserror::Error;

/// Main error type for the vkern library
#[derive(Error, Debug)]
pub enum VkernError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data format or corruption
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Error message describing the issue
        message: String,
    },

    /// Configuration or parameter errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// The host lacks an architecture capability the request needs
    #[error("Not supported: {feature}")]
    NotSupported {
        /// Description of the unsupported feature
        feature: String,
    },

    /// No kernel is registered under the requested name
    #[error("Unknown kernel: {name}")]
    UnknownKernel {
        /// Requested kernel name
        name: String,
    },

    /// The kernel has no implementation with the requested name
    #[error("Unknown implementation '{name}' for kernel {kernel}")]
    UnknownImplementation {
        /// Kernel that was searched
        kernel: String,
        /// Requested implementation name
        name: String,
    },

    /// A buffer does not satisfy an implementation's alignment requirement
    #[error("Implementation {implementation} requires {boundary}-byte aligned buffers")]
    Misaligned {
        /// Implementation that was requested
        implementation: String,
        /// Required alignment boundary in bytes
        boundary: usize,
    },

    /// Profile store errors
    #[error("Profile error: {message}")]
    Profile {
        /// Error message describing the profile issue
        message: String,
    },
}

impl VkernError {
    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a not supported error
    pub fn not_supported<S: Into<String>>(feature: S) -> Self {
        Self::NotSupported { feature: feature.into() }
    }

    /// Create an unknown kernel error
    pub fn unknown_kernel<S: Into<String>>(name: S) -> Self {
        Self::UnknownKernel { name: name.into() }
    }

    /// Create an unknown implementation error
    pub fn unknown_implementation<K: Into<String>, S: Into<String>>(kernel: K, name: S) -> Self {
        Self::UnknownImplementation {
            kernel: kernel.into(),
            name: name.into(),
        }
    }

    /// Create a misaligned buffer error
    pub fn misaligned<S: Into<String>>(implementation: S, boundary: usize) -> Self {
        Self::Misaligned {
            implementation: implementation.into(),
            boundary,
        }
    }

    /// Create a profile store error
    pub fn profile<S: Into<String>>(message: S) -> Self {
        Self::Profile { message: message.into() }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors leave dispatch fully functional: selection simply
    /// proceeds without the failed input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Profile { .. } => true,
            Self::Configuration { .. } => true,
            Self::InvalidData { .. } => false,
            Self::NotSupported { .. } => false,
            Self::UnknownKernel { .. } => false,
            Self::UnknownImplementation { .. } => false,
            Self::Misaligned { .. } => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::InvalidData { .. } => "data",
            Self::Configuration { .. } => "config",
            Self::NotSupported { .. } => "unsupported",
            Self::UnknownKernel { .. } => "kernel",
            Self::UnknownImplementation { .. } => "implementation",
            Self::Misaligned { .. } => "alignment",
            Self::Profile { .. } => "profile",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VkernError>;
