//! Graphics error types.

use ash::vk;
use thiserror::Error;

/// Errors that can occur while acquiring a device or negotiating presentation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// A required system component (loader, instance, device, allocator,
    /// surface) could not be created.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// The hardware does not satisfy a mandatory requirement.
    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),
    /// Creating an individual resource failed after a valid device existed.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A Vulkan query call returned an error code.
    #[error("{call} failed: {result:?}")]
    Vulkan {
        /// Name of the failing entry point.
        call: &'static str,
        /// Result code reported by the driver.
        result: vk::Result,
    },
}

impl GraphicsError {
    /// Build a [`GraphicsError::Vulkan`] for the given call.
    pub fn vulkan(call: &'static str, result: vk::Result) -> Self {
        Self::Vulkan { call, result }
    }

    /// Log the error at the point of detection and hand it back.
    pub(crate) fn logged(self) -> Self {
        log::error!("{self}");
        self
    }
}
