//! GPU buffer resource.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::context::DeviceContext;
use crate::error::GraphicsError;

use super::{memory_location_for, DeviceBound};

/// A buffer with its own allocation.
///
/// # Example
///
/// ```ignore
/// let staging = GpuBuffer::new(&context, 1024, vk::BufferUsageFlags::TRANSFER_SRC)?;
/// if let Some(bytes) = staging.mapped_slice_mut() {
///     bytes.fill(0);
/// }
/// ```
pub struct GpuBuffer<'ctx> {
    context: &'ctx DeviceContext,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
}

impl<'ctx> GpuBuffer<'ctx> {
    /// Create a buffer of exactly `size` bytes.
    ///
    /// Memory placement follows [`memory_location_for`].
    pub fn new(
        context: &'ctx DeviceContext,
        size: u64,
        usage: vk::BufferUsageFlags,
    ) -> Result<Self, GraphicsError> {
        let device = context.device();
        let location = memory_location_for(usage);

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create buffer: {e:?}"))
                .logged()
        })?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let allocation = context.allocator().access(|allocator| {
            let allocation = allocator
                .allocate(&AllocationCreateDesc {
                    name: "buffer",
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    GraphicsError::ResourceCreationFailed(format!(
                        "Failed to allocate buffer memory: {e}"
                    ))
                    .logged()
                });

            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { device.destroy_buffer(buffer, None) };
                    return Err(e);
                }
            };

            if let Err(e) =
                unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
            {
                unsafe { device.destroy_buffer(buffer, None) };
                let _ = allocator.free(allocation);
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "Failed to bind buffer memory: {e:?}"
                ))
                .logged());
            }

            Ok(allocation)
        })?;

        log::trace!("Created buffer: {size} bytes, {usage:?}, {location:?}");

        Ok(Self {
            context,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            location,
        })
    }

    /// Buffer handle.
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes, as requested.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Usage flags the buffer was created with.
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Where the memory lives.
    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// Host-visible contents, or `None` for device-local buffers.
    pub fn mapped_slice_mut(&mut self) -> Option<&mut [u8]> {
        let size = self.size as usize;
        self.allocation
            .as_mut()
            .and_then(Allocation::mapped_slice_mut)
            .map(|bytes| {
                let end = size.min(bytes.len());
                &mut bytes[..end]
            })
    }
}

impl<'ctx> DeviceBound<'ctx> for GpuBuffer<'ctx> {
    fn context(&self) -> &'ctx DeviceContext {
        self.context
    }
}

impl std::fmt::Debug for GpuBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("location", &self.location)
            .finish()
    }
}

impl Drop for GpuBuffer<'_> {
    fn drop(&mut self) {
        let device = self.context.device();
        let allocation = self.allocation.take();

        self.context.allocator().access(|allocator| {
            unsafe { device.destroy_buffer(self.buffer, None) };
            if let Some(allocation) = allocation {
                if let Err(e) = allocator.free(allocation) {
                    log::error!("Failed to free buffer memory: {e}");
                }
            }
        });
    }
}

static_assertions::assert_not_impl_any!(GpuBuffer<'static>: Clone, Copy);
