//! Validation layer debug messenger and diagnostics sink.

use std::ffi::{c_void, CStr};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ash::vk;
use parking_lot::Mutex;

use crate::error::GraphicsError;

/// Destination for validation messages below warning severity.
///
/// Warnings and errors go straight to the `log` facade; everything else is
/// appended to a per-run file so verbose layer chatter does not flood stderr.
#[derive(Debug)]
pub struct DiagnosticsSink {
    file: Mutex<Option<BufWriter<File>>>,
}

impl DiagnosticsSink {
    /// Open (truncating) the log file at `path`.
    ///
    /// A file that cannot be created is reported once and the sink falls back
    /// to debug-level logging.
    pub fn open(path: Option<&Path>) -> Self {
        let file = path.and_then(|path| match File::create(path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                log::warn!(
                    "Could not open diagnostics log {}: {e}",
                    path.display()
                );
                None
            }
        });

        Self {
            file: Mutex::new(file),
        }
    }

    /// Whether messages are being written to a file.
    pub fn has_file(&self) -> bool {
        self.file.lock().is_some()
    }

    /// Route one validation message.
    pub fn record(
        &self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
        message: &str,
    ) {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            log::error!("Vulkan Validation Layer: {message}");
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            log::warn!("Vulkan Validation Layer: {message}");
        } else {
            let entry = format_entry(message_type, message);
            let mut file = self.file.lock();
            match file.as_mut() {
                Some(writer) => {
                    if writeln!(writer, "{entry}").and_then(|_| writer.flush()).is_err() {
                        log::debug!("{entry}");
                    }
                }
                None => log::debug!("{entry}"),
            }
        }
    }
}

/// Category label for a message type.
pub fn category_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "GENERAL"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "VALIDATION"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "PERFORMANCE"
    } else {
        "UNKNOWN"
    }
}

fn format_entry(message_type: vk::DebugUtilsMessageTypeFlagsEXT, message: &str) -> String {
    format!(
        "Vulkan Validation Layer: {} | {message}",
        category_label(message_type)
    )
}

/// Messenger create info routed to `sink`.
///
/// Also chained into instance creation, so `sink` must outlive the instance.
pub(crate) fn messenger_create_info(
    sink: &DiagnosticsSink,
) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .user_data(sink as *const DiagnosticsSink as *mut c_void)
}

/// Create a debug messenger for validation layer output.
pub(crate) fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
    sink: &DiagnosticsSink,
) -> Result<vk::DebugUtilsMessengerEXT, GraphicsError> {
    let create_info = messenger_create_info(sink);

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create debug messenger: {e:?}"))
            .logged()
    })
}

/// Debug callback function for validation layer messages.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        String::from("(no message)")
    } else {
        // SAFETY: callback_data is guaranteed to be valid by the Vulkan driver
        let data = unsafe { *callback_data };
        if data.p_message.is_null() {
            String::from("(null message)")
        } else {
            // SAFETY: p_message is a valid null-terminated string from the Vulkan driver
            unsafe { CStr::from_ptr(data.p_message) }
                .to_string_lossy()
                .into_owned()
        }
    };

    if user_data.is_null() {
        log::debug!("Vulkan Validation Layer: {message}");
    } else {
        // SAFETY: user_data is the boxed sink owned by the DeviceContext, which
        // outlives both the messenger and the instance.
        let sink = unsafe { &*(user_data as *const DiagnosticsSink) };
        sink.record(message_severity, message_type, &message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("graphite-{}-{name}.txt", std::process::id()))
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(
            category_label(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL),
            "GENERAL"
        );
        assert_eq!(
            category_label(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            "VALIDATION"
        );
        assert_eq!(
            category_label(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            "PERFORMANCE"
        );
    }

    #[test]
    fn test_low_severity_goes_to_file() {
        let path = temp_log("low-severity");
        let sink = DiagnosticsSink::open(Some(&path));
        assert!(sink.has_file());

        sink.record(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            "object created",
        );
        sink.record(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            "not in file",
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "Vulkan Validation Layer: VALIDATION | object created\n"
        );
        drop(sink);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_falls_back_to_log() {
        let sink = DiagnosticsSink::open(None);
        assert!(!sink.has_file());
        sink.record(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
            "ignored",
        );
    }

    #[test]
    fn test_create_info_points_at_sink() {
        let sink = DiagnosticsSink::open(None);
        let info = messenger_create_info(&sink);
        assert_eq!(info.p_user_data as *const DiagnosticsSink, &sink as *const _);
        assert!(info.pfn_user_callback.is_some());
    }
}
