//! Presenter - Main Entry Point
//!
//! Opens a resizable window and presents a cleared frame every iteration,
//! rebuilding the presentation chain on resize and pausing while minimized.

mod context;
mod recorder;

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use presenter_core::{EngineConfig, Timer};
use presenter_engine::FrameStatus;
use presenter_platform::{Window, extent_of};

use context::GpuContext;
use recorder::PulsingClear;

/// Config file used when `PRESENTER_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "presenter.toml";

/// How often a minimized window is polled for a usable size.
const SUSPENDED_POLL: Duration = Duration::from_millis(100);

/// Interval between frame statistics log lines.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

struct App {
    config: EngineConfig,
    window: Option<Window>,
    context: Option<GpuContext>,
    stats_timer: Timer,
    last_presented: u64,
    failed: bool,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            context: None,
            stats_timer: Timer::new(),
            last_presented: 0,
            failed: false,
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(context) = self.context.as_mut() else {
            return;
        };

        match context.render_frame() {
            Ok(FrameStatus::Suspended) => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(
                    Instant::now() + SUSPENDED_POLL,
                ));
            }
            Ok(status) => {
                if status == FrameStatus::Rebuilt {
                    info!("Presentation chain rebuilt");
                }
                event_loop.set_control_flow(ControlFlow::Poll);
            }
            Err(e) => {
                error!("Fatal render error: {}", e);
                self.failed = true;
                self.context = None;
                event_loop.exit();
                return;
            }
        }

        if let Some(lap) = self.stats_timer.lap_every(STATS_INTERVAL) {
            let stats = context.stats();
            let fps = (stats.frames_presented - self.last_presented) as f64 / lap.as_secs_f64();
            self.last_presented = stats.frames_presented;
            info!(
                "{:.1} fps; {} presented, {} skipped, {} chain builds, {} suspended polls",
                fps,
                stats.frames_presented,
                stats.frames_skipped,
                stats.rebuilds,
                stats.suspended_polls
            );
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.failed = true;
                event_loop.exit();
                return;
            }
        };

        let recorder = Box::new(PulsingClear::new(self.config.present.clear_color));
        match GpuContext::new(
            &window,
            &self.config.window.title,
            &self.config.present,
            recorder,
        ) {
            Ok(context) => {
                info!("Initialization complete, entering main loop");
                self.context = Some(context);
                self.window = Some(window);
            }
            Err(e) => {
                error!("Failed to initialize presentation: {}", e);
                self.failed = true;
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                // The context must go before the window it presents to
                self.context = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref context) = self.context {
                    context.notify_resized(extent_of(size));
                }
            }
            WindowEvent::RedrawRequested => self.render(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Minimized windows may never get a redraw, so poll directly
        if self.context.as_ref().is_some_and(GpuContext::is_suspended) {
            self.render(event_loop);
        } else if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.context = None;
    }
}

fn main() -> Result<()> {
    presenter_core::init_logging();
    info!("Starting presenter");

    let config_path =
        std::env::var("PRESENTER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = EngineConfig::load(&config_path)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if app.failed {
        bail!("presenter stopped after a fatal error");
    }
    Ok(())
}
