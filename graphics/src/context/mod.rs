//! Device context: instance, physical/logical device, queues and allocator.
//!
//! [`DeviceContext`] is the ownership root every other GPU object borrows
//! from. It is created once at startup and dropped once at shutdown; all
//! resources bound to it carry a `&DeviceContext` so the borrow checker keeps
//! them from outliving it.

mod allocator;
pub mod debug;
pub mod device;
pub mod instance;

use std::ffi::CStr;
use std::mem::ManuallyDrop;

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use graphite_core::GuardedValue;
use raw_window_handle::RawDisplayHandle;

use crate::error::GraphicsError;
use crate::params::ContextParameters;

pub use debug::DiagnosticsSink;
pub use device::{DeviceKind, PhysicalDeviceInfo, QueueFamilyIndices};

use self::device::SelectedDevice;

/// A device queue and the family it was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueRecord {
    /// Queue handle (slot 0 of its family).
    pub queue: vk::Queue,
    /// Family index the queue belongs to.
    pub family: u32,
}

/// Everything created on top of the instance.
struct DeviceObjects {
    selected: SelectedDevice,
    device: ash::Device,
    allocator: Allocator,
}

/// Owner of the Vulkan instance, the selected device and its allocator.
///
/// Shared mutable state (queues, device handles, allocator) is exposed
/// through [`GuardedValue`] so worker threads can use it without extra
/// locking at the call sites.
///
/// # Example
///
/// ```ignore
/// let context = DeviceContext::new(&ContextParameters::new(), None)?;
/// let family = context.graphics_queue().access(|queue| queue.family);
/// ```
pub struct DeviceContext {
    /// Vulkan entry points (function loader).
    entry: ash::Entry,
    /// Vulkan instance.
    instance: ash::Instance,
    /// Debug utils extension instance.
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    /// Debug messenger for validation layer output.
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    /// Receives low-severity validation messages. Boxed so the pointer handed
    /// to the messenger stays stable.
    diagnostics: Option<Box<DiagnosticsSink>>,
    /// Selected physical device.
    physical_device: GuardedValue<vk::PhysicalDevice>,
    /// Cached properties of the selected device.
    device_info: PhysicalDeviceInfo,
    /// Logical device handle.
    logical_device: GuardedValue<vk::Device>,
    /// Device-level function table.
    device: ash::Device,
    /// Graphics, compute and transfer queues, in that order.
    queues: [GuardedValue<QueueRecord>; 3],
    /// Family indices resolved at selection time.
    queue_families: QueueFamilyIndices,
    /// Memory allocator. Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<GuardedValue<Allocator>>,
    /// Enabled instance/device layers.
    validation_layers: Vec<&'static CStr>,
    /// Enabled device extensions after pruning.
    device_extensions: Vec<&'static CStr>,
    /// Surface extension.
    surface_loader: ash::khr::surface::Instance,
    /// Swapchain extension, if the device supports it.
    swapchain_loader: Option<ash::khr::swapchain::Device>,
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("device", &self.device_info.name)
            .field("queue_families", &self.queue_families)
            .field("validation_layers", &self.validation_layers)
            .field("device_extensions", &self.device_extensions)
            .finish()
    }
}

impl DeviceContext {
    /// Create the context.
    ///
    /// This loads the Vulkan library, creates the instance (with validation
    /// if requested), selects a physical device, creates the logical device
    /// and its queues, and sets up the memory allocator.
    ///
    /// `display` selects the presentation extensions to enable; `None` creates
    /// a headless context that can still own surfaces created later only if
    /// the platform needs no extra extension.
    ///
    /// # Errors
    ///
    /// Fails if any step fails. Objects created before the failing step are
    /// destroyed before returning.
    pub fn new(
        params: &ContextParameters,
        display: Option<RawDisplayHandle>,
    ) -> Result<Self, GraphicsError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to load Vulkan: {e}")).logged()
        })?;

        let validation = params.validation && instance::validation_available(&entry);
        if params.validation && !validation {
            log::warn!("Validation layers requested but not available");
        }

        let diagnostics =
            validation.then(|| Box::new(DiagnosticsSink::open(params.diagnostics_log.as_deref())));

        let created = instance::create_instance(&entry, params, display, diagnostics.as_deref())?;
        let instance = created.instance;

        let (debug_utils, debug_messenger) = match diagnostics.as_deref() {
            Some(sink) => {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                match debug::create_debug_messenger(&debug_utils, sink) {
                    Ok(messenger) => (Some(debug_utils), Some(messenger)),
                    Err(e) => {
                        unsafe { instance.destroy_instance(None) };
                        return Err(e);
                    }
                }
            }
            None => (None, None),
        };

        let objects = Self::create_device_objects(&instance, params, &created.validation_layers)
            .inspect_err(|_| unsafe {
                if let (Some(debug_utils), Some(messenger)) = (&debug_utils, debug_messenger) {
                    debug_utils.destroy_debug_utils_messenger(messenger, None);
                }
                instance.destroy_instance(None);
            })?;

        let DeviceObjects {
            selected,
            device,
            allocator,
        } = objects;

        let families = selected.queue_families;
        let queues = [families.graphics, families.compute, families.transfer].map(|family| {
            let queue = unsafe { device.get_device_queue(family, 0) };
            GuardedValue::new(QueueRecord { queue, family })
        });

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let swapchain_loader = selected
            .extensions
            .contains(&ash::khr::swapchain::NAME)
            .then(|| ash::khr::swapchain::Device::new(&instance, &device));

        log::info!(
            "Device context ready on {} ({})",
            selected.info.name,
            selected.info.kind
        );

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            diagnostics,
            physical_device: GuardedValue::new(selected.handle),
            device_info: selected.info,
            logical_device: GuardedValue::new(device.handle()),
            device,
            queues,
            queue_families: families,
            allocator: ManuallyDrop::new(GuardedValue::new(allocator)),
            validation_layers: created.validation_layers,
            device_extensions: selected.extensions,
            surface_loader,
            swapchain_loader,
        })
    }

    /// Create a context with no presentation extensions beyond `VK_KHR_surface`.
    pub fn headless(params: &ContextParameters) -> Result<Self, GraphicsError> {
        Self::new(params, None)
    }

    fn create_device_objects(
        instance: &ash::Instance,
        params: &ContextParameters,
        validation_layers: &[&'static CStr],
    ) -> Result<DeviceObjects, GraphicsError> {
        let selected = device::select_physical_device(instance, &params.device_extensions)?;
        let device = device::create_logical_device(instance, &selected, validation_layers)?;

        let allocator = allocator::create_allocator(instance, selected.handle, &device)
            .inspect_err(|_| unsafe { device.destroy_device(None) })?;

        Ok(DeviceObjects {
            selected,
            device,
            allocator,
        })
    }

    /// Get the Vulkan entry.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Selected physical device.
    pub fn physical_device(&self) -> &GuardedValue<vk::PhysicalDevice> {
        &self.physical_device
    }

    /// Cached properties of the selected physical device.
    pub fn device_info(&self) -> &PhysicalDeviceInfo {
        &self.device_info
    }

    /// Logical device handle.
    pub fn logical_device(&self) -> &GuardedValue<vk::Device> {
        &self.logical_device
    }

    /// Device-level function table.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Memory allocator. Every call into it must go through the guard.
    pub fn allocator(&self) -> &GuardedValue<Allocator> {
        &self.allocator
    }

    /// Graphics queue.
    pub fn graphics_queue(&self) -> &GuardedValue<QueueRecord> {
        &self.queues[0]
    }

    /// Compute queue.
    pub fn compute_queue(&self) -> &GuardedValue<QueueRecord> {
        &self.queues[1]
    }

    /// Transfer queue.
    pub fn transfer_queue(&self) -> &GuardedValue<QueueRecord> {
        &self.queues[2]
    }

    /// Queue family indices resolved at selection time.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Enabled validation layers (empty when validation is off).
    pub fn validation_layers(&self) -> &[&'static CStr] {
        &self.validation_layers
    }

    /// Whether the validation layer is active.
    pub fn validation_enabled(&self) -> bool {
        !self.validation_layers.is_empty()
    }

    /// Device extensions that were actually enabled.
    pub fn enabled_extensions(&self) -> &[&'static CStr] {
        &self.device_extensions
    }

    /// Diagnostics sink, present when validation was requested.
    pub fn diagnostics(&self) -> Option<&DiagnosticsSink> {
        self.diagnostics.as_deref()
    }

    /// Get the surface loader.
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Get the swapchain loader, or `None` if `VK_KHR_swapchain` was pruned.
    pub fn swapchain_loader(&self) -> Option<&ash::khr::swapchain::Device> {
        self.swapchain_loader.as_ref()
    }

    /// Block until the device has finished all submitted work.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.logical_device
            .access(|_| unsafe { self.device.device_wait_idle() })
            .map_err(|e| GraphicsError::vulkan("vkDeviceWaitIdle", e).logged())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            // Wait for device to be idle before cleanup
            let _ = self.device.device_wait_idle();

            // The allocator frees its memory blocks on drop, which needs the device.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
        log::info!("Device context destroyed");
    }
}

static_assertions::assert_impl_all!(DeviceContext: Send, Sync);
static_assertions::assert_not_impl_any!(DeviceContext: Clone);
