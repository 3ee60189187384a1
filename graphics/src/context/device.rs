//! Vulkan physical and logical device management.
//!
//! Selection runs in three steps:
//!
//! 1. Every enumerated device passes through a capability gate: it must
//!    support at least one requested extension (when any are requested) and
//!    expose graphics, compute and transfer queue families.
//! 2. Surviving devices are ranked by [`DeviceKind::priority`]. Among devices
//!    of the same kind the one enumerated last is kept.
//! 3. Extensions the winner lacks are pruned and the three queue roles are
//!    resolved to the first family supporting them.
//!
//! The decision logic lives in plain functions over Vulkan structs so it can be
//! tested without a driver.

use std::cmp::Reverse;
use std::ffi::{c_char, CStr};
use std::fmt;

use ash::vk;

use crate::error::GraphicsError;

/// Priority of a queue in its family.
static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Device type classification, in selection preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    /// Discrete GPU (dedicated graphics card).
    DiscreteGpu,
    /// Integrated GPU (shared with CPU).
    IntegratedGpu,
    /// Virtualized or emulated GPU.
    VirtualGpu,
    /// Software rasterizer running on the CPU.
    Cpu,
    /// Reported as "other" by the driver.
    Other,
    /// A type value this engine does not recognize.
    Unknown,
}

impl DeviceKind {
    /// Bucket index used for ranking. Lower wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::DiscreteGpu => 0,
            Self::IntegratedGpu => 1,
            Self::VirtualGpu => 2,
            Self::Cpu => 3,
            Self::Other => 4,
            Self::Unknown => 5,
        }
    }
}

impl From<vk::PhysicalDeviceType> for DeviceKind {
    fn from(device_type: vk::PhysicalDeviceType) -> Self {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::DiscreteGpu,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::IntegratedGpu,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::VirtualGpu,
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            vk::PhysicalDeviceType::OTHER => Self::Other,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DiscreteGpu => "discrete GPU",
            Self::IntegratedGpu => "integrated GPU",
            Self::VirtualGpu => "virtual GPU",
            Self::Cpu => "CPU",
            Self::Other => "other",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Cached properties of the selected physical device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDeviceInfo {
    /// Device name reported by the driver.
    pub name: String,
    /// Highest Vulkan version supported by the device.
    pub api_version: u32,
    /// Vendor-specific driver version.
    pub driver_version: u32,
    /// PCI vendor id.
    pub vendor_id: u32,
    /// Vendor-specific device id.
    pub device_id: u32,
    /// Device type classification.
    pub kind: DeviceKind,
}

impl PhysicalDeviceInfo {
    /// Extract the cached fields from raw device properties.
    pub fn from_properties(properties: &vk::PhysicalDeviceProperties) -> Self {
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| String::from("<unnamed device>"));

        Self {
            name,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            vendor_id: properties.vendor_id,
            device_id: properties.device_id,
            kind: properties.device_type.into(),
        }
    }

    /// API version formatted as `major.minor.patch`.
    pub fn api_version_string(&self) -> String {
        format!(
            "{}.{}.{}",
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version)
        )
    }
}

/// How well a device covers a list of requested extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSupport {
    /// Every requested extension is available.
    Full,
    /// Some are available; the listed ones are missing.
    Partial(Vec<&'static CStr>),
    /// None of the requested extensions are available.
    Unsupported,
}

impl ExtensionSupport {
    /// Whether the device passes the extension part of the gate.
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Compare requested extensions against the ones a device reports.
///
/// An empty request is always fully supported.
pub fn check_extension_support(
    requested: &[&'static CStr],
    available: &[&CStr],
) -> ExtensionSupport {
    let missing: Vec<&'static CStr> = requested
        .iter()
        .copied()
        .filter(|name| !available.contains(name))
        .collect();

    if missing.is_empty() {
        ExtensionSupport::Full
    } else if missing.len() == requested.len() {
        ExtensionSupport::Unsupported
    } else {
        ExtensionSupport::Partial(missing)
    }
}

/// Drop every requested extension the device does not report.
///
/// Returns the removed names in request order.
pub fn prune_extensions(
    requested: &mut Vec<&'static CStr>,
    available: &[&CStr],
) -> Vec<&'static CStr> {
    let mut removed = Vec::new();
    requested.retain(|name| {
        let supported = available.contains(name);
        if !supported {
            removed.push(*name);
        }
        supported
    });
    removed
}

/// First queue family (in enumeration order) whose flags contain `flag`.
///
/// Families exposing zero queues are skipped.
pub fn find_queue_family(
    families: &[vk::QueueFamilyProperties],
    flag: vk::QueueFlags,
) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_count > 0 && family.queue_flags.contains(flag))
        .map(|index| index as u32)
}

/// Queue family resolved for each of the three queue roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueFamilyIndices {
    /// Family used for graphics work.
    pub graphics: u32,
    /// Family used for compute work.
    pub compute: u32,
    /// Family used for transfers.
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// Resolve all three roles, or `None` if any role has no family.
    pub fn resolve(families: &[vk::QueueFamilyProperties]) -> Option<Self> {
        Some(Self {
            graphics: find_queue_family(families, vk::QueueFlags::GRAPHICS)?,
            compute: find_queue_family(families, vk::QueueFlags::COMPUTE)?,
            transfer: find_queue_family(families, vk::QueueFlags::TRANSFER)?,
        })
    }

    /// Distinct family indices in order of first appearance
    /// (graphics, compute, transfer).
    pub fn unique(&self) -> Vec<u32> {
        let mut unique = Vec::with_capacity(3);
        for family in [self.graphics, self.compute, self.transfer] {
            if !unique.contains(&family) {
                unique.push(family);
            }
        }
        unique
    }
}

/// A device that passed the capability gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<T> {
    /// Whatever identifies the device (handle, name, ...).
    pub device: T,
    /// Its classification.
    pub kind: DeviceKind,
}

/// Pick the preferred candidate.
///
/// The lowest [`DeviceKind::priority`] wins. Between candidates of the same
/// kind the one appearing *last* in `candidates` is chosen, so enumeration
/// order only matters within a kind.
pub fn rank_candidates<T>(
    candidates: impl IntoIterator<Item = Candidate<T>>,
) -> Option<Candidate<T>> {
    candidates
        .into_iter()
        .enumerate()
        .min_by_key(|(index, candidate)| (candidate.kind.priority(), Reverse(*index)))
        .map(|(_, candidate)| candidate)
}

/// The capability gate: a device needs some of the requested extensions and
/// all three queue roles. Returns the resolved families of a passing device.
pub fn gate(
    support: &ExtensionSupport,
    queue_families: Option<QueueFamilyIndices>,
) -> Option<QueueFamilyIndices> {
    queue_families.filter(|_| support.is_acceptable())
}

/// Device features requested at logical device creation.
pub fn required_features() -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(true)
        .sample_rate_shading(true)
        .tessellation_shader(true)
        .geometry_shader(true)
        .fragment_stores_and_atomics(true)
        .fill_mode_non_solid(true)
}

/// One queue create info per distinct family, one queue each.
pub fn queue_create_infos(
    families: &QueueFamilyIndices,
) -> Vec<vk::DeviceQueueCreateInfo<'static>> {
    families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITIES)
        })
        .collect()
}

/// Result of physical device selection.
#[derive(Debug, Clone)]
pub(crate) struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub info: PhysicalDeviceInfo,
    pub queue_families: QueueFamilyIndices,
    /// Requested extensions minus the ones the device lacks.
    pub extensions: Vec<&'static CStr>,
}

fn device_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<Vec<vk::ExtensionProperties>, GraphicsError> {
    unsafe { instance.enumerate_device_extension_properties(device) }
        .map_err(|e| GraphicsError::vulkan("vkEnumerateDeviceExtensionProperties", e))
}

fn extension_names(properties: &[vk::ExtensionProperties]) -> Vec<&CStr> {
    properties
        .iter()
        .filter_map(|extension| extension.extension_name_as_c_str().ok())
        .collect()
}

/// Select the best physical device for rendering.
pub(crate) fn select_physical_device(
    instance: &ash::Instance,
    requested_extensions: &[&'static CStr],
) -> Result<SelectedDevice, GraphicsError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!(
            "Failed to enumerate physical devices: {e:?}"
        ))
        .logged()
    })?;

    if devices.is_empty() {
        return Err(
            GraphicsError::CapabilityMismatch("No physical devices found".to_string()).logged(),
        );
    }

    let mut candidates = Vec::with_capacity(devices.len());
    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let info = PhysicalDeviceInfo::from_properties(&properties);

        let available = match device_extensions(instance, device) {
            Ok(available) => available,
            Err(e) => {
                log::warn!("Skipping {}: {e}", info.name);
                continue;
            }
        };
        let support = check_extension_support(requested_extensions, &extension_names(&available));
        match &support {
            ExtensionSupport::Full => {}
            ExtensionSupport::Partial(missing) => log::warn!(
                "{} supports only some of the required extensions (missing {:?})",
                info.name,
                missing
            ),
            ExtensionSupport::Unsupported => log::info!(
                "{} does not support any of the required extensions",
                info.name
            ),
        }

        let families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_families = gate(&support, QueueFamilyIndices::resolve(&families));

        log::info!(
            "Found GPU: {} (type: {}, API {}, suitable: {})",
            info.name,
            info.kind,
            info.api_version_string(),
            queue_families.is_some()
        );

        if let Some(queue_families) = queue_families {
            candidates.push(Candidate {
                kind: info.kind,
                device: (device, info, queue_families, available),
            });
        }
    }

    let Candidate {
        device: (handle, info, queue_families, available),
        ..
    } = rank_candidates(candidates).ok_or_else(|| {
        GraphicsError::CapabilityMismatch(
            "Could not find a physical device with the required queues and extensions"
                .to_string(),
        )
        .logged()
    })?;

    log::info!("Device Name: {}", info.name);
    log::info!("Device API Version: {}", info.api_version_string());
    log::info!("Device Driver Version: {}", info.driver_version);

    let mut extensions = requested_extensions.to_vec();
    for extension in prune_extensions(&mut extensions, &extension_names(&available)) {
        log::warn!(
            "The {} extension is not supported and therefore will not be used",
            extension.to_string_lossy()
        );
    }

    log::info!(
        "Queue families: graphics {}, compute {}, transfer {}",
        queue_families.graphics,
        queue_families.compute,
        queue_families.transfer
    );

    Ok(SelectedDevice {
        handle,
        info,
        queue_families,
        extensions,
    })
}

/// Create a logical device with the required features and pruned extensions.
pub(crate) fn create_logical_device(
    instance: &ash::Instance,
    selected: &SelectedDevice,
    validation_layers: &[&'static CStr],
) -> Result<ash::Device, GraphicsError> {
    let queue_create_infos = queue_create_infos(&selected.queue_families);
    let extension_names: Vec<*const c_char> =
        selected.extensions.iter().map(|e| e.as_ptr()).collect();
    let layer_names: Vec<*const c_char> = validation_layers.iter().map(|l| l.as_ptr()).collect();
    let features = required_features();

    // Device layers are deprecated but older loaders still read them.
    #[allow(deprecated)]
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(selected.handle, &create_info, None) }
        .map_err(|e| {
            GraphicsError::InitializationFailed(format!(
                "Failed to create logical device: {e:?}"
            ))
            .logged()
        })?;

    log::info!(
        "Created logical device with {} queue(s) and {} extension(s)",
        queue_create_infos.len(),
        extension_names.len()
    );

    Ok(device)
}
