//! GPU image resource and its builder.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::context::DeviceContext;
use crate::error::GraphicsError;

use super::DeviceBound;

/// Description of an image to create.
///
/// # Example
///
/// ```
/// use ash::vk;
/// use graphite_graphics::ImageBuilder;
///
/// let builder = ImageBuilder::new(1024, 512)
///     .with_usage(vk::ImageUsageFlags::SAMPLED)
///     .with_cube_map(true);
/// assert_eq!(builder.mip_levels(), 11);
/// assert_eq!(builder.array_layers(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBuilder {
    width: u32,
    height: u32,
    depth: u32,
    image_type: vk::ImageType,
    usage: vk::ImageUsageFlags,
    samples: vk::SampleCountFlags,
    layers: u32,
    mip_maps: bool,
    cube_map: bool,
}

impl ImageBuilder {
    /// A 2-D sampled image with a full mip chain.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
            image_type: vk::ImageType::TYPE_2D,
            usage: vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            samples: vk::SampleCountFlags::TYPE_1,
            layers: 1,
            mip_maps: true,
            cube_map: false,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_image_type(mut self, image_type: vk::ImageType) -> Self {
        self.image_type = image_type;
        self
    }

    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// Number of layers. Cube maps get six array layers per layer.
    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_mip_maps(mut self, mip_maps: bool) -> Self {
        self.mip_maps = mip_maps;
        self
    }

    pub fn with_cube_map(mut self, cube_map: bool) -> Self {
        self.cube_map = cube_map;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn image_type(&self) -> vk::ImageType {
        self.image_type
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn is_cube_map(&self) -> bool {
        self.cube_map
    }

    /// Mip levels the image will have.
    pub fn mip_levels(&self) -> u32 {
        if self.mip_maps {
            mip_levels(self.width, self.height)
        } else {
            1
        }
    }

    /// Array layers passed to the driver.
    ///
    /// Saturates for cube maps; the driver rejects counts above
    /// `maxImageArrayLayers` at creation.
    pub fn array_layers(&self) -> u32 {
        if self.cube_map {
            self.layers.saturating_mul(6)
        } else {
            self.layers
        }
    }

    /// Image create flags implied by the builder.
    pub fn create_flags(&self) -> vk::ImageCreateFlags {
        if self.cube_map {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        }
    }
}

/// Length of a full mip chain: `floor(log2(max(width, height))) + 1`.
pub fn mip_levels(width: u32, height: u32) -> u32 {
    let largest = width.max(height);
    (u32::BITS - largest.leading_zeros()).max(1)
}

/// First candidate for which `accepted` returns true.
///
/// Candidates after the accepted one are never queried.
pub fn select_format(
    candidates: &[vk::Format],
    mut accepted: impl FnMut(vk::Format) -> bool,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| accepted(format))
}

/// An image with its own device-local allocation.
pub struct GpuImage<'ctx> {
    context: &'ctx DeviceContext,
    image: vk::Image,
    allocation: Option<Allocation>,
    format: vk::Format,
    width: u32,
    height: u32,
    depth: u32,
    mip_levels: u32,
    array_layers: u32,
}

impl<'ctx> GpuImage<'ctx> {
    /// Create an image in `format`.
    pub fn new(
        context: &'ctx DeviceContext,
        builder: &ImageBuilder,
        format: vk::Format,
    ) -> Result<Self, GraphicsError> {
        let device = context.device();

        let image_info = vk::ImageCreateInfo::default()
            .flags(builder.create_flags())
            .image_type(builder.image_type())
            .format(format)
            .extent(vk::Extent3D {
                width: builder.width(),
                height: builder.height(),
                depth: builder.depth(),
            })
            .mip_levels(builder.mip_levels())
            .array_layers(builder.array_layers())
            .samples(builder.samples())
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(builder.usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.create_image(&image_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create image: {e:?}"))
                .logged()
        })?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let allocation = context.allocator().access(|allocator| {
            let allocation = match allocator.allocate(&AllocationCreateDesc {
                name: "image",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { device.destroy_image(image, None) };
                    return Err(GraphicsError::ResourceCreationFailed(format!(
                        "Failed to allocate image memory: {e}"
                    ))
                    .logged());
                }
            };

            if let Err(e) =
                unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
            {
                unsafe { device.destroy_image(image, None) };
                let _ = allocator.free(allocation);
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "Failed to bind image memory: {e:?}"
                ))
                .logged());
            }

            Ok(allocation)
        })?;

        log::trace!(
            "Created image: {}x{}x{} {format:?}, {} mips, {} layers",
            builder.width(),
            builder.height(),
            builder.depth(),
            builder.mip_levels(),
            builder.array_layers()
        );

        Ok(Self {
            context,
            image,
            allocation: Some(allocation),
            format,
            width: builder.width(),
            height: builder.height(),
            depth: builder.depth(),
            mip_levels: builder.mip_levels(),
            array_layers: builder.array_layers(),
        })
    }

    /// Create an image in the first candidate format the device supports for
    /// this builder's type, usage and flags.
    ///
    /// # Errors
    ///
    /// [`GraphicsError::CapabilityMismatch`] if no candidate is supported.
    pub fn with_candidates(
        context: &'ctx DeviceContext,
        builder: &ImageBuilder,
        candidates: &[vk::Format],
    ) -> Result<Self, GraphicsError> {
        let physical_device = context.physical_device().get();

        let format = select_format(candidates, |format| {
            unsafe {
                context.instance().get_physical_device_image_format_properties(
                    physical_device,
                    format,
                    builder.image_type(),
                    vk::ImageTiling::OPTIMAL,
                    builder.usage(),
                    builder.create_flags(),
                )
            }
            .is_ok()
        })
        .ok_or_else(|| {
            GraphicsError::CapabilityMismatch(format!(
                "none of the candidate formats {candidates:?} is supported"
            ))
            .logged()
        })?;

        Self::new(context, builder, format)
    }

    /// Image handle.
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Array layers, including the six faces of a cube map.
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }
}

impl<'ctx> DeviceBound<'ctx> for GpuImage<'ctx> {
    fn context(&self) -> &'ctx DeviceContext {
        self.context
    }
}

impl std::fmt::Debug for GpuImage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuImage")
            .field("image", &self.image)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("mip_levels", &self.mip_levels)
            .field("array_layers", &self.array_layers)
            .finish()
    }
}

impl Drop for GpuImage<'_> {
    fn drop(&mut self) {
        let device = self.context.device();
        let allocation = self.allocation.take();

        self.context.allocator().access(|allocator| {
            unsafe { device.destroy_image(self.image, None) };
            if let Some(allocation) = allocation {
                if let Err(e) = allocator.free(allocation) {
                    log::error!("Failed to free image memory: {e}");
                }
            }
        });
    }
}

static_assertions::assert_not_impl_any!(GpuImage<'static>: Clone, Copy);
