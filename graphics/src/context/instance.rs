//! Vulkan instance creation and configuration.

use std::ffi::{c_char, CStr, CString};

use ash::vk;
use raw_window_handle::RawDisplayHandle;

use crate::error::GraphicsError;
use crate::params::ContextParameters;
use crate::window;

use super::debug::{self, DiagnosticsSink};

/// Validation layer name.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// A created instance together with the layers that were enabled on it.
pub(crate) struct CreatedInstance {
    pub instance: ash::Instance,
    pub validation_layers: Vec<&'static CStr>,
}

/// Create a Vulkan instance.
///
/// `sink` is set only when validation is on and [`validation_available`]
/// returned true; it receives messages emitted during instance creation and
/// destruction as well.
pub(crate) fn create_instance(
    entry: &ash::Entry,
    params: &ContextParameters,
    display: Option<RawDisplayHandle>,
    sink: Option<&DiagnosticsSink>,
) -> Result<CreatedInstance, GraphicsError> {
    let validation = sink.is_some();

    let api_version = match unsafe { entry.try_enumerate_instance_version() } {
        Ok(Some(version)) => version,
        Ok(None) => vk::API_VERSION_1_0,
        Err(e) => {
            return Err(GraphicsError::InitializationFailed(format!(
                "Failed to query instance version: {e:?}"
            ))
            .logged())
        }
    };

    let app_name = CString::new(params.application_name.as_str()).map_err(|_| {
        GraphicsError::InitializationFailed("application name contains a NUL byte".to_string())
            .logged()
    })?;
    let engine_name = c"Graphite Engine";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(api_version);

    let mut extensions = window::required_instance_extensions(display)?;
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
    }

    let validation_layers: Vec<&'static CStr> = if validation {
        vec![VALIDATION_LAYER_NAME]
    } else {
        Vec::new()
    };
    let layer_names: Vec<*const c_char> = validation_layers.iter().map(|l| l.as_ptr()).collect();

    #[allow(unused_mut)]
    let mut create_flags = vk::InstanceCreateFlags::empty();

    #[cfg(target_os = "macos")]
    {
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let mut create_info = vk::InstanceCreateInfo::default()
        .flags(create_flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let mut messenger_info = sink.map(debug::messenger_create_info);
    if let Some(messenger_info) = messenger_info.as_mut() {
        create_info = create_info.push_next(messenger_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {e:?}"))
            .logged()
    })?;

    log::info!(
        "Created Vulkan instance (API {}.{}.{}, {} extensions, validation: {})",
        vk::api_version_major(api_version),
        vk::api_version_minor(api_version),
        vk::api_version_patch(api_version),
        extensions.len(),
        validation
    );

    Ok(CreatedInstance {
        instance,
        validation_layers,
    })
}

/// Whether the loader offers both the validation layer and
/// `VK_EXT_debug_utils`, either globally or through the layer itself.
pub(crate) fn validation_available(entry: &ash::Entry) -> bool {
    if !check_validation_layer_support(entry) {
        return false;
    }

    let global = unsafe { entry.enumerate_instance_extension_properties(None) }
        .unwrap_or_default();
    let from_layer =
        unsafe { entry.enumerate_instance_extension_properties(Some(VALIDATION_LAYER_NAME)) }
            .unwrap_or_default();

    let name = ash::ext::debug_utils::NAME;
    has_extension(&global, name) || has_extension(&from_layer, name)
}

fn has_extension(properties: &[vk::ExtensionProperties], name: &CStr) -> bool {
    properties
        .iter()
        .any(|ext| ext.extension_name_as_c_str() == Ok(name))
}

/// Check if the validation layer is available.
fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let available_layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(_) => return false,
    };

    available_layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER_NAME))
}
