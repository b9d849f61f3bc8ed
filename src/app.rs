//! The windowed viewer: a winit event loop driving one [`Scene`] on the wgpu backend.
//!
//! Every redraw runs `update` then `render` and asks for the next redraw, so the
//! loop spins as fast as the swap chain presents.

use std::sync::Arc;

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{config::SceneConfig, context::Context, input::InputEvent, overlay::LogOverlay, scene::Scene};

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    // Taken when the window comes up.
    config: Option<SceneConfig>,
    scene: Option<Scene<Context>>,
    last_time: Instant,
    frames: u32,
}

impl App {
    pub fn new(config: SceneConfig) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config: Some(config),
            scene: None,
            last_time: Instant::now(),
            frames: 0,
        })
    }

    fn init_scene(&self, window: Arc<Window>, config: SceneConfig) -> anyhow::Result<Scene<Context>> {
        self.async_runtime.block_on(async move {
            let ctx = Context::new(window).await?;
            let (width, height) = ctx.size();
            let mut scene = Scene::new(ctx, width, height, config)?;
            scene.set_overlay(Box::new(LogOverlay::new()));
            let spawned = scene.populate().await?;
            log::info!("Scene ready with {spawned} actors");
            Ok::<_, anyhow::Error>(scene)
        })
    }

    fn shut_down(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(scene) = self.scene.as_mut() {
            scene.destroy();
        }
        self.scene = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else {
            return;
        };
        let window_attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create the main window: {e}");
                event_loop.exit();
                return;
            }
        };
        match self.init_scene(window, config) {
            Ok(scene) => {
                scene.device().window().request_redraw();
                self.scene = Some(scene);
                self.last_time = Instant::now();
            }
            Err(e) => {
                log::error!("App initialization failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => self.shut_down(event_loop),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed().as_secs_f32();
                self.last_time = Instant::now();

                scene.update(dt);
                match scene.render() {
                    Ok(stats) => {
                        self.frames += 1;
                        log::trace!("frame {}: {} draws", self.frames, stats.draws);
                    }
                    Err(e) => log::error!("Unable to render {e}"),
                }

                if scene
                    .config()
                    .exit_after_frames
                    .is_some_and(|limit| self.frames >= limit)
                {
                    log::info!("Rendered {} frames, exiting", self.frames);
                    self.shut_down(event_loop);
                } else {
                    scene.device().window().request_redraw();
                }
            }
            other => {
                if let Some(input) = InputEvent::from_window_event(&other) {
                    if let Err(e) = scene.handle_input(input) {
                        log::warn!("Input {input:?} not applied: {e}");
                    }
                }
            }
        }
    }
}

/// Opens the viewer window and blocks until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<()> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::builder().with_any_thread(true).build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<()> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        EventLoop::builder().with_any_thread(true).build()?
    };

    #[cfg(not(all(
        feature = "integration-tests",
        any(target_os = "linux", target_os = "windows")
    )))]
    let event_loop: EventLoop<()> = EventLoop::new()?;

    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
