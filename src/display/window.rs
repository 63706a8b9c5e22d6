// Window module - Presents pipeline output in a window
//
// This module provides window creation, frame pacing and the window
// presentation backend using the winit and pixels crates.

use super::present::{FrameView, PresentError, Presenter};
use super::source::FrameSource;
use crate::pipeline::{FramePipeline, PipelineError};
use log::{error, info, warn};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Window configuration
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    /// Window scale relative to the unfiltered source (1x-8x)
    pub scale: u32,
    /// Target frame rate in Hz
    pub target_fps: u32,
    /// Whether to enable VSync
    pub vsync: bool,
}

impl WindowConfig {
    /// Create a new window configuration with default values
    ///
    /// Default: 3x scale, 60 FPS, VSync enabled
    pub fn new() -> Self {
        Self {
            scale: 3,
            target_fps: 60,
            vsync: true,
        }
    }

    /// Set the scale factor
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.clamp(1, 8); // Clamp between 1x and 8x
        self
    }

    /// Set the target frame rate
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps.max(1);
        self
    }

    /// Set VSync enabled or disabled
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Window size in pixels for a source of the given size
    pub fn window_size(&self, width: usize, height: usize) -> (u32, u32) {
        (width as u32 * self.scale, height as u32 * self.scale)
    }

    /// Get the frame duration for the target FPS
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.target_fps as u64)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Presentation backend drawing into a `pixels` surface
///
/// The surface is created lazily once the event loop hands out a window;
/// presenting before that fails with `PresentError::SurfaceNotReady`.
#[derive(Default)]
pub struct WindowPresenter {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    buffer_size: (u32, u32),
}

impl WindowPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the window and a surface for frames of `buffer_size`
    pub fn attach(
        &mut self,
        event_loop: &ActiveEventLoop,
        title: &str,
        window_size: (u32, u32),
        buffer_size: (u32, u32),
    ) -> Result<(), PresentError> {
        let window_attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(LogicalSize::new(window_size.0, window_size.1));

        // Wrap window in Arc for shared ownership
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let window_size = window.inner_size();

        // Create surface texture using Arc<Window> for safe 'static lifetime
        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window.clone());
        let pixels = Pixels::new(buffer_size.0, buffer_size.1, surface_texture)?;

        self.window = Some(window);
        self.pixels = Some(pixels);
        self.buffer_size = buffer_size;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Follow a window resize
    pub fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), PresentError> {
        if let Some(pixels) = &mut self.pixels {
            if width > 0 && height > 0 {
                pixels.resize_surface(width, height)?;
            }
        }
        Ok(())
    }
}

impl Presenter for WindowPresenter {
    fn present(&mut self, frame: FrameView<'_>) -> Result<(), PresentError> {
        let pixels = self.pixels.as_mut().ok_or(PresentError::SurfaceNotReady)?;

        // The filter may have changed the output size since the last frame
        let size = (frame.output_width() as u32, frame.output_height() as u32);
        if size != self.buffer_size {
            pixels.resize_buffer(size.0, size.1)?;
            self.buffer_size = size;
        }

        frame.to_rgba(pixels.frame_mut());
        pixels.render()?;
        Ok(())
    }
}

/// Window application driving a frame source through the pipeline
pub struct PipelineWindow<S: FrameSource> {
    config: WindowConfig,
    pipeline: FramePipeline,
    source: S,
    presenter: WindowPresenter,
    last_frame_time: Instant,
    fps_window_start: Instant,
    fps_frames: u32,
}

impl<S: FrameSource> PipelineWindow<S> {
    /// Wrap a configured pipeline and the source that feeds it
    pub fn new(config: WindowConfig, pipeline: FramePipeline, source: S) -> Self {
        let now = Instant::now();
        Self {
            config,
            pipeline,
            source,
            presenter: WindowPresenter::new(),
            last_frame_time: now,
            fps_window_start: now,
            fps_frames: 0,
        }
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    /// Check if enough time has passed for the next frame
    fn should_render_frame(&mut self) -> bool {
        let elapsed = self.last_frame_time.elapsed();
        let frame_duration = self.config.frame_duration();

        if elapsed >= frame_duration {
            self.last_frame_time = Instant::now();
            true
        } else {
            false
        }
    }

    /// Filter and present the next source frame
    fn deliver_and_present(&mut self) -> Result<(), PipelineError> {
        let frame = self.pipeline.deliver_frame(self.source.next_frame())?;
        if let Err(err) = self.presenter.present(frame) {
            warn!("Present failed: {}", err);
        }
        self.count_frame();
        Ok(())
    }

    fn count_frame(&mut self) {
        self.fps_frames += 1;
        let elapsed = self.fps_window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.fps_frames as f64 / elapsed.as_secs_f64();
            self.pipeline.osd_mut().set_status(format!("{:.0} FPS", fps));
            self.fps_frames = 0;
            self.fps_window_start = Instant::now();
        }
    }

    /// Switch to the next filter or blend in the catalog
    fn cycle(&mut self, key: KeyCode) {
        let Some(current) = self.pipeline.settings().copied() else {
            return;
        };
        let next = match key {
            KeyCode::KeyF => current.with_filter(current.filter.next()),
            KeyCode::KeyB => current.with_blend(current.blend.next()),
            _ => return,
        };

        let message = match self.pipeline.configure(next) {
            Ok(()) if key == KeyCode::KeyF => next.filter.to_string(),
            Ok(()) => next.blend.to_string(),
            Err(err) => {
                warn!("Reconfigure failed: {}", err);
                err.to_string()
            }
        };
        info!("{}", message);
        self.pipeline.osd_mut().show_message(message);
    }
}

impl<S: FrameSource> ApplicationHandler for PipelineWindow<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presenter.is_attached() {
            return;
        }

        let (width, height) = (self.source.width(), self.source.height());
        let size = self.config.window_size(width, height);
        let scale = self.pipeline.scale();
        let buffer = ((width * scale) as u32, (height * scale) as u32);
        let title = format!("frameband - {}x{}", size.0, size.1);
        if let Err(err) = self.presenter.attach(event_loop, &title, size, buffer) {
            error!("Failed to create window: {}", err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Err(err) = self.presenter.resize_surface(size.width, size.height) {
                    error!("Resize failed: {}", err);
                    event_loop.exit();
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::KeyF | KeyCode::KeyB => self.cycle(code),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                if self.should_render_frame() {
                    if let Err(err) = self.deliver_and_present() {
                        error!("Frame failed: {}", err);
                        event_loop.exit();
                    }
                } else if let Err(err) = self.pipeline.present(&mut self.presenter) {
                    // Nothing delivered yet is expected right after startup
                    if !matches!(err, PresentError::NothingRetained) {
                        warn!("Repaint failed: {}", err);
                    }
                }

                // Request next frame
                self.presenter.request_redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.presenter.request_redraw();
    }
}

/// Run a configured pipeline in a window until it is closed
///
/// # Arguments
/// * `config` - Window configuration
/// * `pipeline` - Pipeline configured for the source's geometry
/// * `source` - Producer of raw frames
pub fn run_window<S: FrameSource>(
    config: WindowConfig,
    pipeline: FramePipeline,
    source: S,
) -> Result<(), Box<dyn std::error::Error>> {
    if pipeline.settings().is_none() {
        return Err(PipelineError::NotConfigured.into());
    }

    let event_loop = EventLoop::new()?;

    // Set control flow based on VSync setting
    if config.vsync {
        event_loop.set_control_flow(ControlFlow::Wait);
    } else {
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    info!("Starting display window...");
    info!("  Source: {}x{}", source.width(), source.height());
    info!("  Scale: {}x", config.scale);
    info!("  Target FPS: {}", config.target_fps);
    info!("  VSync: {}", config.vsync);

    let mut app = PipelineWindow::new(config, pipeline, source);
    event_loop.run_app(&mut app)?;

    Ok(())
}
