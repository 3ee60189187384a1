//! GPU memory allocator integration using gpu-allocator.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, AllocatorDebugSettings};

use crate::error::GraphicsError;

/// Create a memory allocator for the Vulkan device.
///
/// The allocator is handed out through a `GuardedValue`, which serializes
/// every allocate and free call made by the engine.
pub(crate) fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
) -> Result<Allocator, GraphicsError> {
    let debug_settings = AllocatorDebugSettings {
        log_leaks_on_shutdown: cfg!(debug_assertions),
        ..Default::default()
    };

    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device: device.clone(),
        physical_device,
        debug_settings,
        buffer_device_address: false,
        allocation_sizes: AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {e}"))
            .logged()
    })
}
