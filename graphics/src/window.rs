//! Windowing collaborator interface.
//!
//! The core never creates windows itself. It only needs raw handles to create
//! a presentation surface and the current size to pick a swapchain extent
//! when the platform leaves it up to the application.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};

use crate::error::GraphicsError;

/// A native window a [`SurfaceTarget`](crate::SurfaceTarget) can present to.
pub trait PresentationWindow: HasWindowHandle + HasDisplayHandle {
    /// Current drawable size in physical pixels.
    fn inner_extent(&self) -> vk::Extent2D;
}

impl PresentationWindow for winit::window::Window {
    fn inner_extent(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}

impl<W: PresentationWindow + ?Sized> PresentationWindow for Arc<W> {
    fn inner_extent(&self) -> vk::Extent2D {
        (**self).inner_extent()
    }
}

/// Instance extensions needed to present on the given display.
///
/// Headless contexts (`None`) only enable `VK_KHR_surface`.
pub(crate) fn required_instance_extensions(
    display: Option<RawDisplayHandle>,
) -> Result<Vec<*const std::ffi::c_char>, GraphicsError> {
    match display {
        Some(display) => ash_window::enumerate_required_extensions(display)
            .map(|extensions| extensions.to_vec())
            .map_err(|e| {
                GraphicsError::InitializationFailed(format!(
                    "Failed to query presentation extensions: {e:?}"
                ))
                .logged()
            }),
        None => Ok(vec![ash::khr::surface::NAME.as_ptr()]),
    }
}
