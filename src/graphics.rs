use crate::camera::{Camera, Cameras};
use crate::error::EngineError;
use crate::gpu::headless::{HeadlessDriver, HeadlessHandle};
use crate::gpu::{BlendMode, Gpu, GpuDriver};
use crate::matrix::Matrix;
use crate::script::Script;
use crate::texture::{Texture, TextureCache, TextureKey, TextureSource};
use crate::vertex::{VertexDataset, VertexRegistry};
use std::sync::Arc;
use tessera_game_core::{AssetSource, ErrorReporter, LogReporter, MemoryAssets};

/// Logical game size plus the physical backbuffer it maps onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen {
    pub width: f32,
    pub height: f32,
    pub backbuffer_width: u32,
    pub backbuffer_height: u32,
    /// Physical pixels reserved at the bottom edge (display cutouts).
    pub bottom_inset: i32,
    pub density: f32,
}

impl Screen {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_density(width, height, 1.0, 0)
    }

    pub fn with_density(width: u32, height: u32, density: f32, bottom_inset: i32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            backbuffer_width: (width as f32 * density).round() as u32,
            backbuffer_height: (height as f32 * density).round() as u32 + bottom_inset.max(0) as u32,
            bottom_inset,
            density,
        }
    }
}

/// Render context for one graphics device: the driver, the texture and
/// vertex registries, the scene's cameras and the lazily built quad script.
///
/// Everything in here belongs to the render thread.
pub struct Graphics {
    gpu: Gpu,
    pub textures: TextureCache,
    pub vertices: VertexRegistry,
    pub cameras: Cameras,
    screen: Screen,
    script: Option<Script>,
    reporter: Arc<dyn ErrorReporter>,
    blend: BlendMode,
    context_id: u64,
}

impl Graphics {
    pub fn new(
        driver: Box<dyn GpuDriver>,
        assets: Arc<dyn AssetSource>,
        reporter: Arc<dyn ErrorReporter>,
        screen: Screen,
    ) -> Self {
        let gpu = Gpu::new(driver);
        let context_id = gpu.context_id();
        let mut cameras = Cameras::new();
        cameras.reset(screen.width, screen.height);
        Self {
            gpu,
            textures: TextureCache::new(assets),
            vertices: VertexRegistry::new(),
            cameras,
            screen,
            script: None,
            reporter,
            blend: BlendMode::Normal,
            context_id,
        }
    }

    /// Context over a recording driver, for tests and tools.
    pub fn headless(width: u32, height: u32) -> (Self, HeadlessHandle) {
        Self::headless_with(
            HeadlessDriver::new(),
            Arc::new(MemoryAssets::new()),
            Arc::new(LogReporter),
            Screen::new(width, height),
        )
    }

    pub fn headless_with(
        driver: HeadlessDriver,
        assets: Arc<dyn AssetSource>,
        reporter: Arc<dyn ErrorReporter>,
        screen: Screen,
    ) -> (Self, HeadlessHandle) {
        let handle = driver.handle();
        (Self::new(Box::new(driver), assets, reporter, screen), handle)
    }

    pub fn gpu(&mut self) -> &mut Gpu {
        &mut self.gpu
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn set_screen(&mut self, screen: Screen) {
        self.screen = screen;
    }

    pub fn reporter(&self) -> Arc<dyn ErrorReporter> {
        self.reporter.clone()
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    fn script_parts(&mut self) -> (&mut Gpu, &mut Script, &Screen) {
        let Self {
            gpu,
            script,
            reporter,
            screen,
            ..
        } = self;
        let script = script.get_or_insert_with(|| Script::new(gpu, reporter.as_ref()));
        (gpu, script, screen)
    }

    /// The quad script, built on first use.
    pub fn script(&mut self) -> &mut Script {
        self.script_parts().1
    }

    pub fn texture(&mut self, source: impl Into<TextureSource>) -> Result<Arc<Texture>, EngineError> {
        self.textures.get(source)
    }

    pub fn remove_texture(&mut self, key: &TextureKey) {
        self.textures.remove(key, &mut self.gpu);
    }

    pub fn clear_textures(&mut self) {
        self.textures.clear(&mut self.gpu);
    }

    pub fn bind_texture(&mut self, texture: &Texture) {
        texture.bind(&mut self.gpu);
    }

    pub fn create_dataset(&mut self, data: &[f32]) -> VertexDataset {
        self.vertices.create(&mut self.gpu, data)
    }

    /// Binds `camera`, or the main camera when `None`.
    pub fn set_camera(&mut self, camera: Option<&Arc<Camera>>) {
        let Some(camera) = camera.cloned().or_else(|| self.cameras.main()) else {
            return;
        };
        let (gpu, script, screen) = self.script_parts();
        script.set_camera(gpu, &camera, screen);
    }

    pub fn reset_camera(&mut self) {
        if let Some(script) = self.script.as_mut() {
            script.reset_camera();
        }
    }

    pub fn set_model(&mut self, model: &Matrix) {
        let (gpu, script, _) = self.script_parts();
        script.set_model(gpu, model);
    }

    pub fn lighting(&mut self, mult: [f32; 4], add: [f32; 4]) {
        let (gpu, script, _) = self.script_parts();
        script.lighting(gpu, mult, add);
    }

    pub fn draw_quad(&mut self, dataset: &VertexDataset) {
        let (gpu, script, _) = self.script_parts();
        script.draw_quad(gpu, dataset);
    }

    pub fn draw_quad_set(&mut self, dataset: &VertexDataset, length: usize, offset: usize) {
        let (gpu, script, _) = self.script_parts();
        script.draw_quad_set(gpu, dataset, length, offset);
    }

    pub fn set_blend(&mut self, mode: BlendMode) {
        if self.blend != mode {
            self.gpu.driver().set_blend_mode(mode);
            self.blend = mode;
        }
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn clear(&mut self, color: [f32; 4]) {
        self.gpu.driver().clear(color);
    }

    pub fn set_scissor_test(&mut self, enabled: bool) {
        self.gpu.driver().set_scissor_test(enabled);
    }

    /// Deletes every vertex buffer, live or not.
    pub fn clear_vertices(&mut self) {
        self.vertices.clear(&mut self.gpu);
    }

    /// Deletes buffers of datasets dropped since the last call.
    pub fn collect_garbage(&mut self) -> usize {
        let collected = self.vertices.collect(&mut self.gpu);
        if collected > 0 {
            log::trace!("released {collected} vertex buffers");
        }
        collected
    }

    /// Deletes the script; the next draw builds a fresh one.
    pub fn reset_script(&mut self) {
        if let Some(script) = self.script.take() {
            script.delete(&mut self.gpu);
        }
    }

    /// Drops the script without touching its (already invalid) handles.
    pub fn unuse_script(&mut self) {
        self.script = None;
    }

    /// Moves to a new device. The next [`Self::context_lost`] check reports
    /// the change.
    pub fn replace_driver(&mut self, driver: Box<dyn GpuDriver>) {
        self.gpu.replace_driver(driver);
    }

    pub fn context_lost(&self) -> bool {
        self.gpu.context_id() != self.context_id
    }

    /// Regenerates every texture and vertex buffer from retained CPU data
    /// after the device was lost.
    pub fn restore_context(&mut self) {
        log::info!(
            "graphics context changed ({} -> {}), reloading {} textures and {} buffers",
            self.context_id,
            self.gpu.context_id(),
            self.textures.len(),
            self.vertices.len()
        );
        self.unuse_script();
        self.gpu.invalidate_bindings();
        self.textures.reload(&mut self.gpu);
        self.vertices.reload(&mut self.gpu);
        self.blend = BlendMode::Normal;
        self.context_id = self.gpu.context_id();
    }

    pub fn present(&mut self) -> anyhow::Result<()> {
        self.gpu.driver().present()
    }
}
