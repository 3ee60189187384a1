//! Common utilities for GPU integration tests.
//!
//! Every test builds its context through [`TestContext::new`], which returns
//! `None` when no Vulkan driver or suitable device is present so the tests can
//! skip on headless CI machines.

use graphite_graphics::{ContextParameters, DeviceContext};

/// Validation configurations exercised by the tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validation {
    /// No layers, no debug messenger.
    Off,
    /// Khronos validation if installed; messages go to the log instead of a file.
    On,
}

impl Validation {
    /// Convert to ContextParameters for creating a DeviceContext.
    pub fn to_parameters(self) -> ContextParameters {
        ContextParameters::new()
            .with_application_name("Graphite Tests")
            .with_validation(self == Validation::On)
            .with_diagnostics_log(None)
    }
}

/// Test context owning a headless device context.
pub struct TestContext {
    /// The validation mode being tested.
    #[allow(dead_code)]
    pub validation: Validation,
    /// Device context for creating resources.
    pub context: DeviceContext,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// Returns `None` if Vulkan is not available.
    pub fn new(validation: Validation) -> Option<Self> {
        init_logging();

        let context = DeviceContext::headless(&validation.to_parameters()).ok()?;
        Some(Self {
            validation,
            context,
        })
    }
}

/// Initialize logging for test output.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .is_test(true)
        .try_init();
}
