//! Presentation surfaces and their swapchains.
//!
//! A [`SurfaceTarget`] owns a window and the `VkSurfaceKHR` created for it.
//! Once configured it also owns a [`Swapchain`] with one image view per
//! swapchain image.
//!
//! # Example
//!
//! ```ignore
//! use graphite_graphics::{ContextParameters, DeviceContext, SurfaceTarget};
//!
//! let context = DeviceContext::new(&params, Some(display))?;
//! let mut target = SurfaceTarget::new(&context, window)?;
//!
//! // After a resize:
//! target.reconfigure()?;
//! ```

pub mod negotiation;

use ash::vk;

use crate::context::DeviceContext;
use crate::error::GraphicsError;
use crate::resources::DeviceBound;
use crate::window::PresentationWindow;

/// A negotiated swapchain and the views onto its images.
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    composite_alpha: vk::CompositeAlphaFlagsKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    /// Device handle for cleanup.
    device: ash::Device,
    /// Swapchain loader for cleanup.
    loader: ash::khr::swapchain::Device,
}

impl std::fmt::Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("handle", &self.handle)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("present_mode", &self.present_mode)
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

impl Swapchain {
    /// Negotiate and create a swapchain for `surface`.
    ///
    /// Returns `Ok(None)` when the negotiated extent has a zero dimension
    /// (minimized window); there is nothing to present to until it grows.
    fn create(
        context: &DeviceContext,
        surface: vk::SurfaceKHR,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Option<Self>, GraphicsError> {
        let loader = context.swapchain_loader().ok_or_else(|| {
            GraphicsError::CapabilityMismatch("VK_KHR_swapchain is not enabled".to_string())
                .logged()
        })?;
        let surface_loader = context.surface_loader();
        let physical_device = context.physical_device().get();

        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
        }
        .map_err(|e| {
            GraphicsError::vulkan("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", e).logged()
        })?;

        let formats =
            unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }
                .map_err(|e| {
                    GraphicsError::vulkan("vkGetPhysicalDeviceSurfaceFormatsKHR", e).logged()
                })?;

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
        }
        .map_err(|e| {
            GraphicsError::vulkan("vkGetPhysicalDeviceSurfacePresentModesKHR", e).logged()
        })?;

        let format = negotiation::choose_surface_format(&formats)?;
        let present_mode = negotiation::choose_present_mode(&present_modes);
        let extent = negotiation::choose_extent(&capabilities, window_extent);
        let composite_alpha =
            negotiation::choose_composite_alpha(capabilities.supported_composite_alpha);
        let image_count = negotiation::choose_frame_count(
            capabilities.min_image_count,
            capabilities.max_image_count,
        );

        if extent.width == 0 || extent.height == 0 {
            log::debug!("Surface extent is zero, skipping swapchain creation");
            return Ok(None);
        }

        let (sharing_mode, family_indices) =
            negotiation::sharing_mode(&context.queue_families());

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { loader.create_swapchain(&create_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create swapchain: {e:?}"))
                .logged()
        })?;

        let mut swapchain = Self {
            handle,
            format,
            extent,
            present_mode,
            composite_alpha,
            images: Vec::new(),
            views: Vec::new(),
            device: context.device().clone(),
            loader: loader.clone(),
        };

        // The driver may hand back more images than requested.
        swapchain.images = unsafe { loader.get_swapchain_images(handle) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to get swapchain images: {e:?}"
            ))
            .logged()
        })?;

        swapchain.views.reserve(swapchain.images.len());
        for index in 0..swapchain.images.len() {
            let view = swapchain.create_image_view(swapchain.images[index])?;
            swapchain.views.push(view);
        }

        log::info!(
            "Created swapchain: {}x{} {:?}, {:?}, {} images",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            swapchain.images.len()
        );

        Ok(Some(swapchain))
    }

    fn create_image_view(&self, image: vk::Image) -> Result<vk::ImageView, GraphicsError> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format.format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device.create_image_view(&view_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create swapchain image view: {e:?}"
            ))
            .logged()
        })
    }

    /// Swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Negotiated surface format.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Negotiated present mode.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Negotiated composite alpha mode.
    pub fn composite_alpha(&self) -> vk::CompositeAlphaFlagsKHR {
        self.composite_alpha
    }

    /// Number of images the driver created.
    pub fn frame_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Swapchain images, in driver order.
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per image, in the same order as [`images`](Self::images).
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            for view in self.views.drain(..) {
                self.device.destroy_image_view(view, None);
            }

            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

/// A window bound to a device context, with its surface and swapchain.
///
/// The window is owned so it cannot be destroyed while the surface still
/// refers to it.
pub struct SurfaceTarget<'ctx, W: PresentationWindow> {
    context: &'ctx DeviceContext,
    surface: vk::SurfaceKHR,
    swapchain: Option<Swapchain>,
    window: W,
}

impl<'ctx, W: PresentationWindow> SurfaceTarget<'ctx, W> {
    /// Create the surface for `window` and negotiate a swapchain.
    pub fn new(context: &'ctx DeviceContext, window: W) -> Result<Self, GraphicsError> {
        let mut target = Self::surface_only(context, window)?;
        target.configure()?;
        Ok(target)
    }

    /// Create only the surface. Call [`configure`](Self::configure) before
    /// presenting.
    pub fn surface_only(context: &'ctx DeviceContext, window: W) -> Result<Self, GraphicsError> {
        let display_handle = window.display_handle().map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to get display handle: {e}"))
                .logged()
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to get window handle: {e}"))
                .logged()
        })?;

        let surface = unsafe {
            ash_window::create_surface(
                context.entry(),
                context.instance(),
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to create Vulkan surface: {e}"))
                .logged()
        })?;

        log::debug!("Created Vulkan surface");

        Ok(Self {
            context,
            surface,
            swapchain: None,
            window,
        })
    }

    /// Whether the graphics queue family can present to this surface.
    pub fn surface_supported(&self) -> Result<bool, GraphicsError> {
        let family = self.context.queue_families().graphics;
        let physical_device = self.context.physical_device().get();

        unsafe {
            self.context
                .surface_loader()
                .get_physical_device_surface_support(physical_device, family, self.surface)
        }
        .map_err(|e| GraphicsError::vulkan("vkGetPhysicalDeviceSurfaceSupportKHR", e).logged())
    }

    /// Negotiate the swapchain, replacing any existing one.
    pub fn configure(&mut self) -> Result<(), GraphicsError> {
        if !self.surface_supported()? {
            return Err(GraphicsError::CapabilityMismatch(
                "graphics queue family cannot present to this surface".to_string(),
            )
            .logged());
        }

        self.reconfigure()
    }

    /// Recreate the swapchain for the current window size.
    ///
    /// The previous swapchain is passed to the driver as `old_swapchain` and
    /// destroyed once the new one exists (or creation failed).
    pub fn reconfigure(&mut self) -> Result<(), GraphicsError> {
        let old = self.swapchain.take();
        let old_handle = old
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), Swapchain::handle);

        let created = Swapchain::create(
            self.context,
            self.surface,
            self.window.inner_extent(),
            old_handle,
        );
        drop(old);

        self.swapchain = created?;
        Ok(())
    }

    /// The owned window.
    pub fn window(&self) -> &W {
        &self.window
    }

    /// Surface handle.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Current swapchain, if one has been negotiated.
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    /// Whether a swapchain currently exists.
    pub fn has_swapchain(&self) -> bool {
        self.swapchain.is_some()
    }
}

impl<'ctx, W: PresentationWindow> DeviceBound<'ctx> for SurfaceTarget<'ctx, W> {
    fn context(&self) -> &'ctx DeviceContext {
        self.context
    }
}

impl<W: PresentationWindow> Drop for SurfaceTarget<'_, W> {
    fn drop(&mut self) {
        // Swapchain first, it was created from the surface.
        drop(self.swapchain.take());

        unsafe {
            self.context
                .surface_loader()
                .destroy_surface(self.surface, None);
        }
        log::debug!("Destroyed Vulkan surface");
    }
}

static_assertions::assert_not_impl_any!(Swapchain: Clone);
static_assertions::assert_not_impl_any!(SurfaceTarget<'static, winit::window::Window>: Clone);
