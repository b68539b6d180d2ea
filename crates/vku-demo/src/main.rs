// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use vku_core::init_tracing;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

mod config;
mod renderer;

use config::{load_cfg, DemoCfg};
use renderer::Renderer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config
    #[arg(long, default_value = "vku.toml")]
    config: PathBuf,
    /// Override the configured window width
    #[arg(long)]
    width: Option<u32>,
    /// Override the configured window height
    #[arg(long)]
    height: Option<u32>,
}

struct App {
    cfg: DemoCfg,
    // renderer before window: surfaces must go before the window they target
    renderer: Option<Renderer>,
    window: Option<Window>,
    size: PhysicalSize<u32>,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn paused(&self) -> bool {
        self.size.width == 0 || self.size.height == 0
    }

    fn rebuild(&mut self) {
        if self.paused() {
            return;
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(self.size.width, self.size.height) {
                error!("swapchain rebuild failed: {e:#}");
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.cfg.window.width, self.cfg.window.height));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => w,
            Err(e) => {
                error!("create_window failed: {e}");
                event_loop.exit();
                return;
            }
        };
        self.size = window.inner_size();

        match Renderer::new(&window, &self.cfg) {
            Ok(r) => self.renderer = Some(r),
            Err(e) => {
                error!("vulkan init failed: {e:#}");
                event_loop.exit();
                return;
            }
        }
        info!("window {}x{}", self.size.width, self.size.height);

        event_loop.set_control_flow(ControlFlow::Poll);
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.renderer = None;
                self.window = None;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => {
                self.size = new_size;
                info!("Resized → {}x{} (paused={})", new_size.width, new_size.height, self.paused());
                self.rebuild();
            }

            WindowEvent::RedrawRequested => {
                if self.paused() {
                    return;
                }
                let Some(renderer) = &mut self.renderer else {
                    return;
                };
                match renderer.draw() {
                    Ok(()) => self.frames = self.frames.saturating_add(1),
                    Err(e) if e.is_out_of_date() => {
                        warn!("{e}; rebuilding swapchain");
                        self.rebuild();
                    }
                    Err(e) => error!("render error: {e}"),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.paused() {
            self.frames = 0;
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = load_cfg(&args.config);
    if let Some(w) = args.width {
        cfg.window.width = w;
    }
    if let Some(h) = args.height {
        cfg.window.height = h;
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        renderer: None,
        window: None,
        size: PhysicalSize::new(0, 0),
        frames: 0,
        last_fps_instant: Instant::now(),
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
