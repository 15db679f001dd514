use crate::config::EngineConfig;
use crate::game::{Game, SceneFactory};
use crate::gpu::wgpu_backend::WgpuDriver;
use crate::graphics::{Graphics, Screen};
use crate::logging::init_logging;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tessera_game_audio::Audio;
use tessera_game_core::{AssetSource, DirAssets, ErrorReporter, LogReporter};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

/// Desktop host: one window, one wgpu device, one [`Game`].
pub struct TesseraApp {
    game: Game,
    assets: Arc<dyn AssetSource>,
    reporter: Arc<dyn ErrorReporter>,
    window: Option<Arc<Window>>,
    graphics: Option<Graphics>,
    last_frame: Instant,
    paused: bool,
}

impl TesseraApp {
    pub fn new(game: Game, assets: Arc<dyn AssetSource>) -> Self {
        let reporter = game.reporter();
        Self {
            game,
            assets,
            reporter,
            window: None,
            graphics: None,
            last_frame: Instant::now(),
            paused: false,
        }
    }

    pub fn game(&mut self) -> &mut Game {
        &mut self.game
    }

    fn open_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_config = &self.game.config().window;
        let attributes = Window::default_attributes()
            .with_title(&window_config.title)
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        let window = Arc::new(event_loop.create_window(attributes).context("creating window")?);
        let driver = WgpuDriver::new(window.clone())?;

        let size = window.inner_size();
        let render = &self.game.config().render;
        let screen = Screen::with_density(size.width, size.height, render.density, render.bottom_inset);
        let mut graphics = Graphics::new(Box::new(driver), self.assets.clone(), self.reporter.clone(), screen);
        self.game.create(&mut graphics);
        self.game.resize(&mut graphics, size.width, size.height);

        window.request_redraw();
        self.window = Some(window);
        self.graphics = Some(graphics);
        Ok(())
    }

    /// Replaces a lost device. Textures and buffers are rebuilt on the
    /// next context check.
    fn recover_device(&mut self) -> anyhow::Result<()> {
        let (Some(window), Some(graphics)) = (&self.window, self.graphics.as_mut()) else {
            return Ok(());
        };
        if !graphics.gpu().driver().is_lost() {
            return Ok(());
        }
        let driver = WgpuDriver::new(window.clone())?;
        graphics.replace_driver(Box::new(driver));
        self.game.create(graphics);
        Ok(())
    }
}

impl ApplicationHandler<()> for TesseraApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.graphics.is_none() {
            if let Err(err) = self.open_window(event_loop) {
                self.reporter.report("starting graphics", &err);
                event_loop.exit();
            }
            return;
        }
        if let Err(err) = self.recover_device() {
            self.reporter.report("recovering graphics device", &err);
            event_loop.exit();
            return;
        }
        if let Some(graphics) = self.graphics.as_mut() {
            self.game.resume(graphics);
        }
        self.paused = false;
        self.last_frame = Instant::now();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(graphics) = self.graphics.as_mut() {
            self.game.pause(graphics);
        }
        self.paused = true;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let delta = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;
                if self.paused {
                    return;
                }
                if let Err(err) = self.recover_device() {
                    self.reporter.report("recovering graphics device", &err);
                    event_loop.exit();
                    return;
                }
                if let Some(graphics) = self.graphics.as_mut() {
                    self.game.render(graphics, delta);
                    if let Err(err) = graphics.present() {
                        self.game.report_exception("presenting frame", &err);
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(graphics) = self.graphics.as_mut() {
                    graphics.gpu().driver().resize_surface(size.width, size.height);
                    self.game.resize(graphics, size.width, size.height);
                }
            }
            WindowEvent::CloseRequested => {
                self.game.dispose();
                event_loop.exit();
            }
            _ => (),
        }
    }
}

fn create_audio(assets: &Arc<dyn AssetSource>, reporter: Arc<dyn ErrorReporter>) -> Audio {
    #[cfg(feature = "rodio-backend")]
    {
        match tessera_game_audio::RodioAudio::new(assets.clone()) {
            Ok(driver) => return Audio::new(Arc::new(driver), reporter),
            Err(err) => reporter.report("opening audio output", &err),
        }
    }
    #[cfg(not(feature = "rodio-backend"))]
    let _ = (assets, &reporter);
    Audio::silent()
}

/// Opens a window and runs `first_scene` until it is closed.
pub fn run_app(config: EngineConfig, first_scene: SceneFactory) -> anyhow::Result<()> {
    init_logging(&config.logging);
    let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);
    let assets: Arc<dyn AssetSource> = Arc::new(DirAssets::new(&config.assets.root));
    let audio = create_audio(&assets, reporter.clone());
    let game = Game::new(config, first_scene)
        .with_reporter(reporter)
        .with_audio(audio);

    let event_loop = EventLoop::new().context("creating event loop")?;
    let mut app = TesseraApp::new(game, assets);
    event_loop.run_app(&mut app).context("running event loop")?;
    Ok(())
}
