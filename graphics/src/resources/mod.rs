//! GPU resources.
//!
//! This module contains the memory-backed objects created against a
//! [`DeviceContext`]:
//! - [`GpuBuffer`] - linear buffer memory
//! - [`GpuImage`] - optimally tiled image memory, described by an [`ImageBuilder`]
//!
//! Resources borrow their context for `'ctx` and cannot be cloned, so each
//! one is released exactly once and never after the context is gone.
//!
//! [`DeviceContext`]: crate::DeviceContext

mod buffer;
mod image;

pub use buffer::GpuBuffer;
pub use image::{mip_levels, select_format, GpuImage, ImageBuilder};

use ash::vk;
use gpu_allocator::MemoryLocation;

use crate::context::DeviceContext;

/// An object tied to the lifetime of a [`DeviceContext`].
pub trait DeviceBound<'ctx> {
    /// The context this object was created from.
    fn context(&self) -> &'ctx DeviceContext;
}

/// Memory location used for a buffer with the given usage.
///
/// Vertex and index data live in device-local memory; everything else is
/// host-visible so the CPU can write it directly.
pub fn memory_location_for(usage: vk::BufferUsageFlags) -> MemoryLocation {
    if usage.intersects(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::VERTEX_BUFFER) {
        MemoryLocation::GpuOnly
    } else {
        MemoryLocation::CpuToGpu
    }
}
