//! Window and swapchain integration test.
//!
//! This test creates a real window, binds a [`SurfaceTarget`] to it and
//! negotiates a swapchain, then recreates the swapchain a few times the way a
//! resize would.
//!
//! # CI Compatibility
//!
//! If the event loop or window cannot be created (e.g., on headless CI
//! systems), or the selected device cannot present to the surface, the test
//! passes gracefully.
//!
//! # Running This Test
//!
//! ```bash
//! cargo test --test window_test
//! ```

use std::sync::Arc;

use rstest::rstest;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
#[cfg(target_os = "linux")]
use winit::platform::x11::EventLoopBuilderExtX11;
use winit::raw_window_handle::HasDisplayHandle;
use winit::window::{Window, WindowId};

use graphite_graphics::{ContextParameters, DeviceContext, SurfaceTarget};

/// Number of swapchain recreations before the test passes.
const RECONFIGURATIONS: u32 = 3;

/// What the test does with the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Negotiate a swapchain and recreate it.
    Swapchain,
    /// Create the surface only and drop it without ever configuring.
    SurfaceOnly,
}

/// Test result that can be shared across the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestResult {
    /// Test is still running.
    Running,
    /// Test passed successfully.
    Passed,
    /// Test was skipped (window/device not available).
    Skipped,
    /// Test failed with an error.
    Failed,
}

/// Application state for the window test.
struct WindowTestApp<'ctx> {
    mode: Mode,
    result: TestResult,
    context: &'ctx DeviceContext,
    /// Surface target owning the window (created on resume).
    target: Option<SurfaceTarget<'ctx, Arc<Window>>>,
    reconfigurations: u32,
}

impl<'ctx> WindowTestApp<'ctx> {
    fn new(context: &'ctx DeviceContext, mode: Mode) -> Self {
        Self {
            mode,
            result: TestResult::Running,
            context,
            target: None,
            reconfigurations: 0,
        }
    }

    /// Bind the window to the context. Returns the result to finish with, if any.
    fn init_surface(&mut self, window: Arc<Window>) -> Option<TestResult> {
        let target = match SurfaceTarget::surface_only(self.context, window) {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Failed to create surface: {e}");
                return Some(TestResult::Failed);
            }
        };

        match target.surface_supported() {
            Ok(true) => {}
            Ok(false) => {
                log::info!("Device cannot present to this surface, skipping test");
                return Some(TestResult::Skipped);
            }
            Err(e) => {
                log::warn!("Surface support query failed: {e}");
                return Some(TestResult::Failed);
            }
        }

        if self.mode == Mode::SurfaceOnly {
            assert!(!target.has_swapchain());
            drop(target);
            return Some(TestResult::Passed);
        }

        self.target = Some(target);
        self.reconfigure()
    }

    /// Recreate the swapchain and check its invariants.
    fn reconfigure(&mut self) -> Option<TestResult> {
        let target = self.target.as_mut()?;

        if let Err(e) = target.reconfigure() {
            log::warn!("Failed to configure swapchain: {e}");
            return Some(TestResult::Failed);
        }

        // A minimized window legitimately has no swapchain
        let swapchain = target.swapchain()?;

        let consistent = swapchain.images().len() == swapchain.views().len()
            && swapchain.frame_count() as usize == swapchain.images().len()
            && swapchain.extent().width > 0
            && swapchain.extent().height > 0;
        if !consistent {
            log::error!("Inconsistent swapchain: {swapchain:?}");
            return Some(TestResult::Failed);
        }

        log::info!(
            "Swapchain {} ready: {:?}",
            self.reconfigurations,
            swapchain
        );
        self.reconfigurations += 1;

        (self.reconfigurations > RECONFIGURATIONS).then_some(TestResult::Passed)
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop, result: TestResult) {
        self.result = result;
        event_loop.exit();
    }

    /// Check if test is complete.
    fn is_complete(&self) -> bool {
        !matches!(self.result, TestResult::Running)
    }
}

impl ApplicationHandler for WindowTestApp<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.target.is_some() || self.is_complete() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Graphite Window Test")
            .with_inner_size(winit::dpi::LogicalSize::new(320, 240))
            .with_visible(true); // Need visible window for events

        match event_loop.create_window(window_attributes) {
            Ok(window) => {
                log::info!("Test window created successfully");
                if let Some(result) = self.init_surface(Arc::new(window)) {
                    self.finish(event_loop, result);
                }
            }
            Err(e) => {
                log::info!("Window creation failed (expected on CI): {e}");
                self.finish(event_loop, TestResult::Skipped);
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                self.finish(event_loop, TestResult::Failed); // Unexpected close
            }
            WindowEvent::Resized(_) | WindowEvent::RedrawRequested => {
                if let Some(result) = self.reconfigure() {
                    self.finish(event_loop, result);
                    return;
                }
                if let Some(target) = &self.target {
                    target.window().request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(target) = &self.target {
            target.window().request_redraw();
        }
    }
}

/// Build an event loop usable from a test thread, or `None` to skip.
fn build_event_loop() -> Option<EventLoop<()>> {
    // Tests run on worker threads
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    let event_loop = EventLoop::builder().with_any_thread(true).build();

    // On macOS, EventLoop must be created on the main thread
    #[cfg(target_os = "macos")]
    #[allow(clippy::redundant_closure)]
    let event_loop = match std::panic::catch_unwind(|| EventLoop::new()) {
        Ok(result) => result,
        Err(_) => {
            log::info!("Event loop needs the main thread on macOS, skipping");
            return None;
        }
    };

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    let event_loop = EventLoop::new();

    match event_loop {
        Ok(event_loop) => Some(event_loop),
        Err(e) => {
            log::info!("Event loop creation failed (expected on CI): {e}");
            None
        }
    }
}

/// Run the window test with event pumping (test-friendly approach).
///
/// Returns true if the test passed or was skipped (CI compatibility).
fn run_window_test(mode: Mode) -> bool {
    // Initialize logging for test output
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .is_test(true)
        .try_init();

    log::info!("Starting window integration test: {mode:?}");

    let Some(mut event_loop) = build_event_loop() else {
        return true; // Skip test, consider passed
    };

    let display = match event_loop.display_handle() {
        Ok(display) => display.as_raw(),
        Err(e) => {
            log::info!("No display handle (expected on CI): {e}");
            return true;
        }
    };

    let params = ContextParameters::new()
        .with_application_name("Graphite Window Test")
        .with_diagnostics_log(None);
    let context = match DeviceContext::new(&params, Some(display)) {
        Ok(context) => context,
        Err(e) => {
            log::info!("Vulkan not available, skipping: {e}");
            return true;
        }
    };

    let mut app = WindowTestApp::new(&context, mode);

    // Use pump_events for controlled iteration (test-friendly)
    // This allows us to have a timeout and not block forever
    let max_iterations = 1000;
    let mut iterations = 0;

    loop {
        let status = event_loop.pump_app_events(None, &mut app);

        match status {
            PumpStatus::Exit(_code) => {
                log::info!("Event loop exited");
                break;
            }
            PumpStatus::Continue => {
                if app.is_complete() {
                    break;
                }

                iterations += 1;
                if iterations >= max_iterations {
                    log::warn!("Test timed out after {max_iterations} iterations");
                    app.result = TestResult::Failed;
                    break;
                }

                // Small delay to avoid busy-waiting
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
    }

    let result = app.result;

    // Surface and swapchain go before the context
    drop(app);
    drop(context);

    match result {
        TestResult::Passed => {
            log::info!("Window test PASSED");
            true
        }
        TestResult::Skipped => {
            log::info!("Window test SKIPPED (no display available)");
            true // Skipped tests are considered passing for CI
        }
        TestResult::Failed => {
            log::error!("Window test FAILED");
            false
        }
        TestResult::Running => {
            log::warn!("Window test ended in Running state (timeout)");
            false
        }
    }
}

#[rstest]
#[case::swapchain(Mode::Swapchain)]
#[case::surface_only(Mode::SurfaceOnly)]
fn test_window_surface(#[case] mode: Mode) {
    assert!(
        run_window_test(mode),
        "Window surface test failed - see log for details"
    );
}
