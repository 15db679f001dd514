use crate::error::EngineError;
use crate::gpu::{Filter, Gpu, PixelFormat, TextureId, Wrap};
use crate::pixmap::Pixmap;
use crate::utils::Rectangle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tessera_game_core::AssetSource;
use uuid::Uuid;

/// GPU texture backed by a retained pixmap. The handle is generated on the
/// first bind; filter, wrap and pixel changes are applied on the next bind.
#[derive(Debug)]
pub struct Texture {
    state: Mutex<TextureState>,
}

#[derive(Debug)]
struct TextureState {
    pixmap: Arc<Pixmap>,
    id: Option<TextureId>,
    filter: Filter,
    wrap: Wrap,
    params_dirty: bool,
    image_dirty: bool,
}

impl Texture {
    pub fn new(pixmap: impl Into<Arc<Pixmap>>) -> Self {
        Self::with_params(pixmap, Filter::Nearest, Wrap::Clamp)
    }

    pub fn with_params(pixmap: impl Into<Arc<Pixmap>>, filter: Filter, wrap: Wrap) -> Self {
        Self {
            state: Mutex::new(TextureState {
                pixmap: pixmap.into(),
                id: None,
                filter,
                wrap,
                params_dirty: false,
                image_dirty: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TextureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn width(&self) -> u32 {
        self.lock().pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.lock().pixmap.height()
    }

    pub fn pixmap(&self) -> Arc<Pixmap> {
        self.lock().pixmap.clone()
    }

    pub fn id(&self) -> Option<TextureId> {
        self.lock().id
    }

    pub fn is_generated(&self) -> bool {
        self.lock().id.is_some()
    }

    pub fn filter_mode(&self) -> Filter {
        self.lock().filter
    }

    pub fn wrap_mode(&self) -> Wrap {
        self.lock().wrap
    }

    pub fn set_filter(&self, filter: Filter) {
        let mut state = self.lock();
        state.filter = filter;
        state.params_dirty = state.id.is_some();
    }

    pub fn set_wrap(&self, wrap: Wrap) {
        let mut state = self.lock();
        state.wrap = wrap;
        state.params_dirty = state.id.is_some();
    }

    /// Replaces the pixel data. A generated texture re-uploads on next bind.
    pub fn set_image(&self, pixmap: impl Into<Arc<Pixmap>>) {
        let mut state = self.lock();
        state.pixmap = pixmap.into();
        state.image_dirty = state.id.is_some();
    }

    pub fn bind(&self, gpu: &mut Gpu) {
        let mut state = self.lock();
        match state.id {
            None => state.generate(gpu),
            Some(id) => {
                gpu.bind_texture(id);
                if state.image_dirty {
                    state.upload(gpu);
                }
                if state.params_dirty {
                    state.apply_params(gpu);
                }
            }
        }
    }

    /// Converts a pixel rectangle into normalized UV coordinates.
    pub fn uv_rect(&self, left: f32, top: f32, right: f32, bottom: f32) -> Rectangle {
        let state = self.lock();
        let w = state.pixmap.width() as f32;
        let h = state.pixmap.height() as f32;
        Rectangle::from_edges(left / w, top / h, right / w, bottom / h)
    }

    pub fn uv_rect_by_size(&self, left: f32, top: f32, width: f32, height: f32) -> Rectangle {
        self.uv_rect(left, top, left + width, top + height)
    }

    pub(crate) fn delete(&self, gpu: &mut Gpu) {
        if let Some(id) = self.lock().id.take() {
            gpu.delete_texture(id);
        }
    }

    /// Forgets the old handle without deleting it and regenerates from the
    /// retained pixmap.
    pub(crate) fn reload(&self, gpu: &mut Gpu) {
        let mut state = self.lock();
        state.id = None;
        state.generate(gpu);
    }
}

impl TextureState {
    fn generate(&mut self, gpu: &mut Gpu) {
        let id = gpu.driver().gen_texture();
        self.id = Some(id);
        gpu.bind_texture(id);
        self.upload(gpu);
        self.apply_params(gpu);
        log::trace!("texture {id:?} generated ({}x{})", self.pixmap.width(), self.pixmap.height());
    }

    fn upload(&mut self, gpu: &mut Gpu) {
        let pixmap = &self.pixmap;
        gpu.driver()
            .tex_image_2d(pixmap.width(), pixmap.height(), PixelFormat::Rgba8, pixmap.data());
        self.image_dirty = false;
    }

    fn apply_params(&mut self, gpu: &mut Gpu) {
        let driver = gpu.driver();
        driver.tex_filter(self.filter, self.filter);
        driver.tex_wrap(self.wrap, self.wrap);
        self.params_dirty = false;
    }
}

/// Registry key. Solid and gradient textures are keyed by their colors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextureKey {
    Asset(String),
    Named(String),
    Solid(u32),
    Gradient(Vec<u32>),
    Pixels(Uuid),
}

/// Anything [`TextureCache::get`] can resolve.
#[derive(Debug, Clone)]
pub enum TextureSource {
    Texture(Arc<Texture>),
    Pixels(Arc<Pixmap>),
    Asset(String),
}

impl From<Arc<Texture>> for TextureSource {
    fn from(texture: Arc<Texture>) -> Self {
        TextureSource::Texture(texture)
    }
}

impl From<Arc<Pixmap>> for TextureSource {
    fn from(pixmap: Arc<Pixmap>) -> Self {
        TextureSource::Pixels(pixmap)
    }
}

impl From<Pixmap> for TextureSource {
    fn from(pixmap: Pixmap) -> Self {
        TextureSource::Pixels(Arc::new(pixmap))
    }
}

impl From<&str> for TextureSource {
    fn from(name: &str) -> Self {
        TextureSource::Asset(name.to_string())
    }
}

impl From<String> for TextureSource {
    fn from(name: String) -> Self {
        TextureSource::Asset(name)
    }
}

/// Deduplicating texture registry. Factories return the existing instance
/// for an equal key.
pub struct TextureCache {
    all: HashMap<TextureKey, Arc<Texture>>,
    assets: Arc<dyn AssetSource>,
}

impl TextureCache {
    pub fn new(assets: Arc<dyn AssetSource>) -> Self {
        Self {
            all: HashMap::new(),
            assets,
        }
    }

    /// 1x1 texture of an `0xAARRGGBB` color.
    pub fn create_solid(&mut self, color: u32) -> Arc<Texture> {
        self.all
            .entry(TextureKey::Solid(color))
            .or_insert_with(|| Arc::new(Texture::new(Pixmap::solid(color))))
            .clone()
    }

    /// Horizontal gradient with one texel per color, linearly filtered.
    pub fn create_gradient(&mut self, colors: &[u32]) -> Arc<Texture> {
        self.all
            .entry(TextureKey::Gradient(colors.to_vec()))
            .or_insert_with(|| {
                Arc::new(Texture::with_params(
                    Pixmap::gradient(colors),
                    Filter::Linear,
                    Wrap::Clamp,
                ))
            })
            .clone()
    }

    /// Blank texture registered under `key`. The size only applies when the
    /// key is new.
    pub fn create(&mut self, key: &str, width: u32, height: u32) -> Arc<Texture> {
        self.all
            .entry(TextureKey::Named(key.to_string()))
            .or_insert_with(|| {
                Arc::new(Texture::with_params(
                    Pixmap::new(width, height),
                    Filter::Linear,
                    Wrap::Clamp,
                ))
            })
            .clone()
    }

    /// Resolves a texture. Live textures pass through unregistered; pixel
    /// buffers are keyed by their identity; names are loaded from assets.
    pub fn get(&mut self, source: impl Into<TextureSource>) -> Result<Arc<Texture>, EngineError> {
        match source.into() {
            TextureSource::Texture(texture) => Ok(texture),
            TextureSource::Pixels(pixmap) => Ok(self
                .all
                .entry(TextureKey::Pixels(pixmap.id()))
                .or_insert_with(|| Arc::new(Texture::new(pixmap)))
                .clone()),
            TextureSource::Asset(name) => {
                let key = TextureKey::Asset(name.clone());
                if let Some(texture) = self.all.get(&key) {
                    return Ok(texture.clone());
                }
                let texture = Arc::new(Texture::new(self.load(&name)?));
                self.all.insert(key, texture.clone());
                Ok(texture)
            }
        }
    }

    fn load(&self, name: &str) -> Result<Pixmap, EngineError> {
        let bytes = self.assets.open(name).map_err(|source| EngineError::Asset {
            name: name.to_string(),
            source,
        })?;
        let pixmap = Pixmap::decode(&bytes).map_err(|source| EngineError::Decode {
            name: name.to_string(),
            source,
        })?;
        log::debug!("loaded texture {name} ({}x{})", pixmap.width(), pixmap.height());
        Ok(pixmap)
    }

    pub fn contains(&self, key: &TextureKey) -> bool {
        self.all.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Evicts and deletes one texture. Images still holding it keep the CPU
    /// data and regenerate a handle if drawn again.
    pub fn remove(&mut self, key: &TextureKey, gpu: &mut Gpu) {
        if let Some(texture) = self.all.remove(key) {
            texture.delete(gpu);
        }
    }

    pub fn clear(&mut self, gpu: &mut Gpu) {
        for (_, texture) in self.all.drain() {
            texture.delete(gpu);
        }
        gpu.invalidate_bindings();
    }

    /// Regenerates every handle after context loss.
    pub fn reload(&mut self, gpu: &mut Gpu) {
        for texture in self.all.values() {
            texture.reload(gpu);
        }
    }
}
