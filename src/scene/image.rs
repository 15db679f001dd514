use super::gizmo::{Gizmo, GizmoCore, UpdateContext};
use super::group::Recyclable;
use super::visual::{Visual, VisualGizmo};
use crate::error::EngineError;
use crate::graphics::Graphics;
use crate::texture::{Texture, TextureSource};
use crate::utils::Rectangle;
use crate::vertex::VertexDataset;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

struct ImageState {
    texture: Option<Arc<Texture>>,
    frame: Rectangle,
    flip_horizontal: bool,
    flip_vertical: bool,
    vertices: [f32; 16],
    dataset: Option<VertexDataset>,
    dirty: bool,
}

/// A textured quad. The four vertices are rebuilt when the frame, flips or
/// size change and uploaded on the next draw; unchanged images reuse their
/// buffer as is.
pub struct Image {
    visual: Visual,
    state: Mutex<ImageState>,
}

impl Image {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Image>| Image {
            visual: Visual::new(me.clone(), 0.0, 0.0, 0.0, 0.0),
            state: Mutex::new(ImageState {
                texture: None,
                frame: Rectangle::unit(),
                flip_horizontal: false,
                flip_vertical: false,
                vertices: [0.0; 16],
                dataset: None,
                dirty: false,
            }),
        })
    }

    /// Image showing the whole texture at its natural size.
    pub fn with_texture(texture: Arc<Texture>) -> Arc<Self> {
        let image = Self::new();
        image.set_texture(texture);
        image
    }

    /// Image showing a pixel region of the texture.
    pub fn with_region(texture: Arc<Texture>, left: f32, top: f32, width: f32, height: f32) -> Arc<Self> {
        let image = Self::with_texture(texture);
        image.set_frame_px(left, top, width, height);
        image
    }

    /// Resolves `source` through the texture registry.
    pub fn load(gfx: &mut Graphics, source: impl Into<TextureSource>) -> Result<Arc<Self>, EngineError> {
        Ok(Self::with_texture(gfx.texture(source)?))
    }

    fn lock(&self) -> MutexGuard<'_, ImageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn texture(&self) -> Option<Arc<Texture>> {
        self.lock().texture.clone()
    }

    /// Switches texture and resets the frame to all of it.
    pub fn set_texture(&self, texture: Arc<Texture>) {
        self.lock().texture = Some(texture);
        self.set_frame(Rectangle::unit());
    }

    pub fn frame(&self) -> Rectangle {
        self.lock().frame
    }

    /// Sets the UV frame and resizes the image to the frame's pixel size.
    pub fn set_frame(&self, frame: Rectangle) {
        let mut state = self.lock();
        state.frame = frame;
        if let Some(texture) = &state.texture {
            let mut visual = self.visual.lock();
            visual.width = frame.width * texture.width() as f32;
            visual.height = frame.height * texture.height() as f32;
        }
        self.update_frame(&mut state);
        self.update_vertices(&mut state);
    }

    /// Frame from a pixel rectangle of the current texture.
    pub fn set_frame_px(&self, left: f32, top: f32, width: f32, height: f32) {
        let Some(texture) = self.texture() else {
            return;
        };
        self.set_frame(texture.uv_rect_by_size(left, top, width, height));
    }

    /// Takes texture, frame, size and scale from `other`.
    pub fn copy_from(&self, other: &Image) {
        let (texture, frame) = {
            let theirs = other.lock();
            (theirs.texture.clone(), theirs.frame)
        };
        let (width, height, scale) = {
            let v = other.visual.lock();
            (v.width, v.height, v.scale)
        };
        let mut state = self.lock();
        state.texture = texture;
        state.frame = frame;
        {
            let mut visual = self.visual.lock();
            visual.width = width;
            visual.height = height;
            visual.scale = scale;
        }
        self.update_frame(&mut state);
        self.update_vertices(&mut state);
    }

    /// Changes the unscaled size without touching the frame.
    pub fn set_size(&self, width: f32, height: f32) {
        let mut state = self.lock();
        {
            let mut visual = self.visual.lock();
            visual.width = width;
            visual.height = height;
        }
        self.update_vertices(&mut state);
    }

    pub fn flip_horizontal(&self) -> bool {
        self.lock().flip_horizontal
    }

    pub fn flip_vertical(&self) -> bool {
        self.lock().flip_vertical
    }

    pub fn set_flip_horizontal(&self, value: bool) {
        let mut state = self.lock();
        if state.flip_horizontal != value {
            state.flip_horizontal = value;
            self.update_frame(&mut state);
        }
    }

    pub fn set_flip_vertical(&self, value: bool) {
        let mut state = self.lock();
        if state.flip_vertical != value {
            state.flip_vertical = value;
            self.update_frame(&mut state);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn has_dataset(&self) -> bool {
        self.lock().dataset.is_some()
    }

    pub fn vertices(&self) -> [f32; 16] {
        self.lock().vertices
    }

    // UVs from the frame, honoring flips.
    fn update_frame(&self, state: &mut ImageState) {
        let f = state.frame;
        let v = &mut state.vertices;
        let (left, right) = if state.flip_horizontal {
            (f.right(), f.left())
        } else {
            (f.left(), f.right())
        };
        let (top, bottom) = if state.flip_vertical {
            (f.bottom(), f.top())
        } else {
            (f.top(), f.bottom())
        };
        v[2] = left;
        v[6] = right;
        v[10] = right;
        v[14] = left;
        v[3] = top;
        v[7] = top;
        v[11] = bottom;
        v[15] = bottom;
        state.dirty = true;
    }

    // Positions from the unscaled size.
    fn update_vertices(&self, state: &mut ImageState) {
        let (width, height) = {
            let visual = self.visual.lock();
            (visual.width, visual.height)
        };
        let v = &mut state.vertices;
        v[0] = 0.0;
        v[1] = 0.0;
        v[4] = width;
        v[5] = 0.0;
        v[8] = width;
        v[9] = height;
        v[12] = 0.0;
        v[13] = height;
        state.dirty = true;
    }
}

impl Gizmo for Image {
    fn core(&self) -> &GizmoCore {
        self.visual.core()
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) {
        self.visual.update_motion(ctx.elapsed);
    }

    fn draw(&self, gfx: &mut Graphics) {
        if self.visual.outside_main_view(gfx) {
            return;
        }
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.dirty && state.dataset.is_none() {
            return;
        }
        let Some(texture) = state.texture.clone() else {
            return;
        };
        let model = self.visual.refresh_matrix();

        if state.dirty {
            let vertices = state.vertices;
            match state.dataset.as_ref() {
                Some(dataset) => dataset.mark_for_update(Some(&vertices)),
                None => state.dataset = Some(gfx.create_dataset(&vertices)),
            }
            state.dirty = false;
        }

        let color = self.visual.color();
        gfx.bind_texture(&texture);
        gfx.set_camera(self.visual.core().camera().as_ref());
        gfx.set_model(&model);
        gfx.lighting(color.mult(), color.add());
        if let Some(dataset) = &state.dataset {
            gfx.draw_quad(dataset);
        }
    }

    /// Detaches and gives the vertex buffer back; the registry deletes it at
    /// its next collection.
    fn destroy(&self) {
        self.visual.core().detach();
        self.lock().dataset = None;
    }

    fn is_visible(&self) -> bool {
        self.visual.is_visible()
    }
}

impl VisualGizmo for Image {
    fn visual(&self) -> &Visual {
        &self.visual
    }
}

impl Recyclable for Image {
    fn create() -> Arc<Self> {
        Image::new()
    }
}
