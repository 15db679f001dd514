//! Frame driver: owns the current scene and the clocks, and runs the
//! draw/update cycle against a [`Graphics`] context.

use crate::config::EngineConfig;
use crate::graphics::{Graphics, Screen};
use crate::scene::{Group, Scene, UpdateContext};
use std::sync::Arc;
use tessera_game_audio::Audio;
use tessera_game_core::{ErrorReporter, LogReporter, RngService, RngStream};

/// Builds a fresh instance of a scene. Kept so the scene can be rebuilt on
/// [`Game::reset_scene`].
pub type SceneFactory = Arc<dyn Fn() -> Arc<dyn Scene> + Send + Sync>;

/// Hooks around the next scene's `create`.
pub trait SceneChange: Send {
    fn before_create(&mut self, _scene: &Arc<dyn Scene>) {}
    fn after_create(&mut self, _scene: &Arc<dyn Scene>) {}
}

pub struct Game {
    config: EngineConfig,
    scene: Arc<dyn Scene>,
    factory: SceneFactory,
    requested_reset: bool,
    on_change: Option<Box<dyn SceneChange>>,
    time_scale: f32,
    elapsed: f32,
    time_total: f32,
    rng: RngStream,
    audio: Option<Audio>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Game {
    /// The first scene is built on the first rendered frame.
    pub fn new(config: EngineConfig, first_scene: SceneFactory) -> Self {
        let rng = match config.time.seed {
            Some(seed) => RngService::with_seed(seed),
            None => RngService::from_clock(),
        }
        .derive_named("scene");
        let placeholder: Arc<dyn Scene> = Group::new();
        Self {
            time_scale: config.time.scale,
            config,
            scene: placeholder,
            factory: first_scene,
            requested_reset: true,
            on_change: None,
            elapsed: 0.0,
            time_total: 0.0,
            rng,
            audio: None,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_audio(mut self, audio: Audio) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> Arc<dyn Scene> {
        self.scene.clone()
    }

    pub fn audio(&self) -> Option<&Audio> {
        self.audio.as_ref()
    }

    pub fn reporter(&self) -> Arc<dyn ErrorReporter> {
        self.reporter.clone()
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale;
    }

    /// Scaled seconds covered by the last update.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn time_total(&self) -> f32 {
        self.time_total
    }

    /// Requests a switch at the end of the next frame's draw.
    pub fn switch_scene(&mut self, factory: SceneFactory) {
        self.factory = factory;
        self.requested_reset = true;
        self.on_change = None;
    }

    pub fn switch_scene_with(&mut self, factory: SceneFactory, callback: Box<dyn SceneChange>) {
        self.switch_scene(factory);
        self.on_change = Some(callback);
    }

    /// Rebuilds the current scene from its factory.
    pub fn reset_scene(&mut self) {
        self.requested_reset = true;
    }

    pub fn is_switch_pending(&self) -> bool {
        self.requested_reset
    }

    /// The graphics context has been (re)created.
    pub fn create(&mut self, gfx: &mut Graphics) {
        if gfx.context_lost() {
            gfx.restore_context();
        }
    }

    /// The surface changed to `width` x `height` physical pixels.
    pub fn resize(&mut self, gfx: &mut Graphics, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if gfx.context_lost() {
            gfx.restore_context();
        }
        let render = &self.config.render;
        let density = if render.density > 0.0 { render.density } else { 1.0 };
        let usable = height as i32 - render.bottom_inset;
        let screen = Screen {
            width: width as f32 / density,
            height: usable.max(1) as f32 / density,
            backbuffer_width: width,
            backbuffer_height: height,
            bottom_inset: render.bottom_inset,
            density,
        };
        let current = gfx.screen();
        if current.width != screen.width || current.height != screen.height {
            log::debug!("screen resized to {}x{}", screen.width, screen.height);
            gfx.set_screen(screen);
            self.reset_scene();
        } else {
            gfx.set_screen(screen);
        }
    }

    /// Runs one frame: draw, pending scene switch, then update with
    /// `delta` real seconds.
    pub fn render(&mut self, gfx: &mut Graphics, delta: f32) {
        gfx.collect_garbage();
        gfx.reset_camera();
        gfx.set_scissor_test(false);
        gfx.clear(self.config.render.clear_color);
        self.scene.draw(gfx);
        gfx.set_scissor_test(false);

        if self.requested_reset {
            self.requested_reset = false;
            self.switch_now(gfx);
        }

        self.elapsed = self.time_scale * delta;
        self.time_total += self.elapsed;

        if let Some(audio) = &self.audio {
            audio.samples.update(self.elapsed);
        }

        let mut ctx = UpdateContext::new(self.elapsed, &mut self.rng);
        ctx.time_total = self.time_total;
        ctx.freeze_emitters = self.config.time.freeze_emitters;
        self.scene.update(&mut ctx);

        let screen = *gfx.screen();
        gfx.cameras.update_all(screen.width, screen.height);
    }

    fn switch_now(&mut self, gfx: &mut Graphics) {
        self.scene.destroy();
        let screen = *gfx.screen();
        gfx.cameras.reset(screen.width, screen.height);
        gfx.clear_vertices();

        let scene = (self.factory)();
        self.scene = scene.clone();
        let mut on_change = self.on_change.take();
        if let Some(callback) = on_change.as_mut() {
            callback.before_create(&scene);
        }
        scene.create(gfx);
        if let Some(callback) = on_change.as_mut() {
            callback.after_create(&scene);
        }

        self.elapsed = 0.0;
        self.time_scale = 1.0;
        self.time_total = 0.0;
        log::info!("switched to scene {}", scene.type_name());
    }

    /// The host went to the background.
    pub fn pause(&mut self, gfx: &mut Graphics) {
        self.scene.on_pause();
        gfx.reset_script();
        if let Some(audio) = &self.audio {
            audio.pause();
        }
    }

    pub fn resume(&mut self, gfx: &mut Graphics) {
        if gfx.context_lost() {
            gfx.restore_context();
        }
        if let Some(audio) = &self.audio {
            audio.resume();
        }
    }

    pub fn dispose(&mut self) {
        self.scene.destroy();
        if let Some(audio) = &self.audio {
            audio.shutdown();
        }
    }

    pub fn report_exception(&self, context: &str, error: &anyhow::Error) {
        self.reporter.report(context, error);
    }
}
