//! Engine entry point.
//!
//! Opens a window, builds the renderer and drives one frame per redraw
//! until the window is closed.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event_loop::ControlFlow;
use winit::window::WindowId;

use engine_core::{EngineConfig, FrameRateCounter, Timer, fps_title, init_logging};
use engine_platform::{ActiveEventLoop, EventLoop, Window, WindowEvent};
use engine_renderer::{FrameLoop, FrameStatus, Renderer};
use engine_scene::Scene;

struct App {
    config: EngineConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    frame_loop: FrameLoop,
    fps: FrameRateCounter,
    timer: Timer,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            frame_loop: FrameLoop::new(),
            fps: FrameRateCounter::new(),
            timer: Timer::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(Window::new(
            event_loop,
            self.config.width,
            self.config.height,
            &self.config.title,
        )?);
        let renderer = Renderer::new(window.clone(), self.config.clone(), Scene::default_layout())?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.frame_loop = FrameLoop::new();
        self.fps = FrameRateCounter::new();

        info!("Initialization complete, entering main loop");
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer)) = (&self.window, &mut self.renderer) else {
            return;
        };

        // Minimised: nothing to present to until the window has area again.
        if window.is_zero_sized() {
            return;
        }

        match self.frame_loop.draw_frame(renderer) {
            Ok(FrameStatus::Presented) => {}
            Ok(status) => debug!("Frame finished with {:?}", status),
            Err(e) => {
                error!("Render error: {}", e);
                event_loop.exit();
                return;
            }
        }

        if let Some(fps) = self.fps.frame() {
            window.set_title(&fps_title(fps));
        }
    }

    fn shutdown(&mut self) {
        if let Some(renderer) = &self.renderer
            && let Err(e) = renderer.wait_idle()
        {
            error!("Failed to wait for device idle: {}", e);
        }
        self.renderer = None;
        self.window = None;
        info!("Shut down after {:.1}s", self.timer.elapsed().as_secs_f32());
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            error!("Failed to initialize: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = &mut self.renderer {
                    renderer.request_resize();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let config = EngineConfig::load()?;
    init_logging(config.debug);
    info!("Starting engine (debug: {})", config.debug);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
