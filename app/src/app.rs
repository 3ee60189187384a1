//! Viewer application and event loop.

use std::error::Error;
use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
use winit::raw_window_handle::HasDisplayHandle;
use winit::window::{Window, WindowId};

use graphite_graphics::{DeviceContext, GraphicsError, SurfaceTarget};

use crate::args::AppArgs;

/// Window state bound to a device context.
///
/// The window and its surface are created on the first `resumed` event and
/// live until the event loop exits. The context is created up front and
/// outlives the viewer.
pub struct Viewer<'ctx> {
    context: &'ctx DeviceContext,
    args: AppArgs,
    target: Option<SurfaceTarget<'ctx, Arc<Window>>>,
    frame_number: u64,
    error: Option<GraphicsError>,
}

impl<'ctx> Viewer<'ctx> {
    /// Create a new viewer.
    pub fn new(context: &'ctx DeviceContext, args: AppArgs) -> Self {
        Self {
            context,
            args,
            target: None,
            frame_number: 0,
            error: None,
        }
    }

    /// Number of redraws handled so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Take the error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<GraphicsError> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: GraphicsError) {
        self.error = Some(error);
        event_loop.exit();
    }

    /// Create the window and its surface target.
    fn init_target(&mut self, event_loop: &ActiveEventLoop) -> Result<(), GraphicsError> {
        let window_attributes = Window::default_attributes()
            .with_title(self.args.title.as_str())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.args.width,
                self.args.height,
            ));

        let window = event_loop.create_window(window_attributes).map_err(|e| {
            log::error!("Failed to create window: {e}");
            GraphicsError::InitializationFailed(format!("Failed to create window: {e}"))
        })?;

        let target = SurfaceTarget::new(self.context, Arc::new(window))?;

        if let Some(swapchain) = target.swapchain() {
            log::info!(
                "Presenting {}x{} with {} images ({:?})",
                swapchain.extent().width,
                swapchain.extent().height,
                swapchain.frame_count(),
                swapchain.present_mode()
            );
        }

        self.target = Some(target);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(target) = &mut self.target else {
            return;
        };

        // Recover after a minimize
        if !target.has_swapchain() {
            if let Err(e) = target.reconfigure() {
                self.fail(event_loop, e);
                return;
            }
        }

        self.frame_number += 1;

        if let Some(max_frames) = self.args.frames {
            if self.frame_number >= max_frames {
                log::info!("Reached max frames limit ({max_frames}), exiting");
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler for Viewer<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.target.is_some() {
            return;
        }

        if let Err(e) = self.init_target(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(target) = &mut self.target {
                    if let Err(e) = target.reconfigure() {
                        self.fail(event_loop, e);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(target) = &self.target {
            target.window().request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Swapchain and surface go while the window still exists
        self.target = None;
        log::info!("Viewer exiting after {} frames", self.frame_number);
    }
}

/// Create the event loop and device context, then run the viewer.
pub fn run(args: AppArgs) -> Result<(), Box<dyn Error>> {
    #[cfg(target_os = "windows")]
    let event_loop = EventLoop::builder().with_any_thread(true).build()?;

    #[cfg(not(target_os = "windows"))]
    let event_loop = EventLoop::new()?;

    let display = event_loop.display_handle()?.as_raw();
    let context = DeviceContext::new(&args.context_parameters(), Some(display))?;

    let mut viewer = Viewer::new(&context, args);
    event_loop.run_app(&mut viewer)?;

    match viewer.take_error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
