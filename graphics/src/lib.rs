//! # Graphite Graphics
//!
//! Vulkan device acquisition and presentation setup for the Graphite engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`DeviceContext`] - Instance, physical/logical device, queues and memory allocator
//! - [`SurfaceTarget`] - A window's presentation surface and its negotiated swapchain
//! - [`GpuBuffer`] / [`GpuImage`] - Memory-backed resources bound to a context
//! - [`ContextParameters`] - Configuration for context creation
//!
//! ## Example
//!
//! ```ignore
//! use graphite_graphics::{ContextParameters, DeviceContext, GpuBuffer};
//! use ash::vk;
//!
//! let context = DeviceContext::headless(&ContextParameters::new())?;
//! let buffer = GpuBuffer::new(&context, 1024, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
//! ```

pub mod context;
pub mod error;
pub mod params;
pub mod resources;
pub mod surface;
pub mod window;

// Re-export main types for convenience
pub use context::{
    DeviceContext, DeviceKind, DiagnosticsSink, PhysicalDeviceInfo, QueueFamilyIndices,
    QueueRecord,
};
pub use error::GraphicsError;
pub use params::ContextParameters;
pub use resources::{memory_location_for, DeviceBound, GpuBuffer, GpuImage, ImageBuilder};
pub use surface::{Swapchain, SurfaceTarget};
pub use window::PresentationWindow;

pub use ash;
pub use gpu_allocator::MemoryLocation;

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Graphite Graphics v{} initialized", VERSION);
}
