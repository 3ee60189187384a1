//! Swapchain parameter selection.
//!
//! Pure functions over what the surface reports, kept apart from the Vulkan
//! calls so each preference rule can be tested without a device.

use ash::vk;

use crate::context::QueueFamilyIndices;
use crate::error::GraphicsError;

/// Preferred surface format.
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Composite alpha modes in order of preference.
const COMPOSITE_ALPHA_PREFERENCE: [vk::CompositeAlphaFlagsKHR; 4] = [
    vk::CompositeAlphaFlagsKHR::OPAQUE,
    vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    vk::CompositeAlphaFlagsKHR::INHERIT,
];

/// Number of swapchain images to request.
///
/// One more than the minimum, clamped to `[min, max]`. A `max` of 0 means the
/// surface has no upper limit.
pub fn choose_frame_count(min_image_count: u32, max_image_count: u32) -> u32 {
    let max = if max_image_count == 0 {
        u32::MAX
    } else {
        max_image_count
    };
    min_image_count.saturating_add(1).clamp(min_image_count, max.max(min_image_count))
}

/// First supported composite alpha mode by preference.
///
/// Falls back to OPAQUE when the surface reports none of them.
pub fn choose_composite_alpha(
    supported: vk::CompositeAlphaFlagsKHR,
) -> vk::CompositeAlphaFlagsKHR {
    COMPOSITE_ALPHA_PREFERENCE
        .into_iter()
        .find(|&mode| supported.contains(mode))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// MAILBOX if available, otherwise whatever the surface reported first.
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is guaranteed to be available
        available
            .first()
            .copied()
            .unwrap_or(vk::PresentModeKHR::FIFO)
    }
}

/// [`PREFERRED_FORMAT`] if offered, otherwise the first reported format.
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, GraphicsError> {
    available
        .iter()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| available.first())
        .copied()
        .ok_or_else(|| {
            GraphicsError::CapabilityMismatch("surface reports no formats".to_string()).logged()
        })
}

/// Swapchain extent for the given capabilities and window size.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Image sharing for the swapchain.
///
/// Concurrent over the graphics and transfer families when they differ.
pub fn sharing_mode(families: &QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    if families.graphics != families.transfer {
        (
            vk::SharingMode::CONCURRENT,
            vec![families.graphics, families.transfer],
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::two_three(2, 3, 3)]
    #[case::two_two(2, 2, 2)]
    #[case::unbounded(2, 0, 3)]
    #[case::single(1, 8, 2)]
    #[case::saturated(u32::MAX, 0, u32::MAX)]
    fn test_frame_count(#[case] min: u32, #[case] max: u32, #[case] expected: u32) {
        assert_eq!(choose_frame_count(min, max), expected);
    }

    #[test]
    fn test_composite_alpha_preference() {
        use vk::CompositeAlphaFlagsKHR as A;

        assert_eq!(choose_composite_alpha(A::OPAQUE | A::INHERIT), A::OPAQUE);
        assert_eq!(
            choose_composite_alpha(A::POST_MULTIPLIED | A::PRE_MULTIPLIED),
            A::PRE_MULTIPLIED
        );
        assert_eq!(
            choose_composite_alpha(A::INHERIT | A::POST_MULTIPLIED),
            A::POST_MULTIPLIED
        );
        assert_eq!(choose_composite_alpha(A::INHERIT), A::INHERIT);
        assert_eq!(choose_composite_alpha(A::empty()), A::OPAQUE);
    }

    #[test]
    fn test_present_mode() {
        use vk::PresentModeKHR as P;

        assert_eq!(choose_present_mode(&[P::FIFO, P::MAILBOX]), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::IMMEDIATE, P::FIFO]), P::IMMEDIATE);
        assert_eq!(choose_present_mode(&[]), P::FIFO);
    }

    #[test]
    fn test_surface_format_prefers_srgb() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(
            choose_surface_format(&[unorm, PREFERRED_FORMAT]).unwrap(),
            PREFERRED_FORMAT
        );
        assert_eq!(choose_surface_format(&[unorm]).unwrap(), unorm);
    }

    #[test]
    fn test_surface_format_ignores_wrong_color_space() {
        let hdr = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        let rgba = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[hdr, rgba]).unwrap(), hdr);
    }

    #[test]
    fn test_surface_format_empty() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(GraphicsError::CapabilityMismatch(_))
        ));
    }

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_extent_uses_current() {
        let current = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let window = vk::Extent2D {
            width: 1,
            height: 1,
        };
        assert_eq!(choose_extent(&capabilities(current), window), current);
    }

    #[test]
    fn test_extent_clamps_window_size() {
        let sentinel = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let window = vk::Extent2D {
            width: 4000,
            height: 10,
        };
        assert_eq!(
            choose_extent(&capabilities(sentinel), window),
            vk::Extent2D {
                width: 1920,
                height: 64,
            }
        );
    }

    #[test]
    fn test_sharing_mode() {
        let shared = QueueFamilyIndices {
            graphics: 0,
            compute: 1,
            transfer: 0,
        };
        assert_eq!(sharing_mode(&shared), (vk::SharingMode::EXCLUSIVE, vec![]));

        let split = QueueFamilyIndices {
            graphics: 0,
            compute: 0,
            transfer: 2,
        };
        assert_eq!(
            sharing_mode(&split),
            (vk::SharingMode::CONCURRENT, vec![0, 2])
        );
    }
}
