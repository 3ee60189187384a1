//! Device context configuration.

use std::ffi::CStr;
use std::path::PathBuf;

/// Default file receiving low-severity validation messages.
pub const DEFAULT_DIAGNOSTICS_LOG: &str = "VulkanLogs.txt";

/// Parameters for creating a [`DeviceContext`](crate::DeviceContext).
///
/// # Example
///
/// ```
/// use graphite_graphics::ContextParameters;
///
/// let params = ContextParameters::new()
///     .with_application_name("Viewer")
///     .with_validation(false);
/// assert!(!params.validation);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextParameters {
    /// Application name reported to the driver.
    pub application_name: String,
    /// Enable the Khronos validation layer and the debug messenger.
    pub validation: bool,
    /// File receiving validation messages below warning severity.
    /// `None` routes them to the `log` facade at debug level.
    pub diagnostics_log: Option<PathBuf>,
    /// Device extensions to request. Unsupported ones are dropped after
    /// physical device selection.
    pub device_extensions: Vec<&'static CStr>,
}

impl Default for ContextParameters {
    fn default() -> Self {
        Self {
            application_name: "Graphite".to_string(),
            validation: cfg!(debug_assertions),
            diagnostics_log: Some(PathBuf::from(DEFAULT_DIAGNOSTICS_LOG)),
            device_extensions: vec![
                ash::khr::swapchain::NAME,
                ash::khr::get_memory_requirements2::NAME,
            ],
        }
    }
}

impl ContextParameters {
    /// Create parameters with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Enable or disable validation.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the diagnostics log file.
    pub fn with_diagnostics_log(mut self, path: Option<PathBuf>) -> Self {
        self.diagnostics_log = path;
        self
    }

    /// Request an additional device extension.
    pub fn with_device_extension(mut self, extension: &'static CStr) -> Self {
        if !self.device_extensions.contains(&extension) {
            self.device_extensions.push(extension);
        }
        self
    }

    /// Replace the requested device extensions.
    pub fn with_device_extensions(mut self, extensions: Vec<&'static CStr>) -> Self {
        self.device_extensions = extensions;
        self
    }
}
