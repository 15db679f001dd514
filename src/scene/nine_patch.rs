use super::gizmo::{Gizmo, GizmoCore, UpdateContext};
use super::visual::{Visual, VisualGizmo};
use crate::graphics::Graphics;
use crate::texture::Texture;
use crate::utils::Rectangle;
use crate::vertex::{self, VertexDataset, FLOATS_PER_QUAD};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Margins {
    pub fn uniform(margin: u32) -> Self {
        Self {
            left: margin,
            top: margin,
            right: margin,
            bottom: margin,
        }
    }
}

struct PatchState {
    outer: Rectangle,
    inner: Rectangle,
    margins: Margins,
    flip_horizontal: bool,
    flip_vertical: bool,
    quads: Vec<f32>,
    dataset: Option<VertexDataset>,
    dirty: bool,
}

/// A stretchable frame: corners keep their pixel size, edges and center
/// stretch. Drawn as nine quads out of one buffer.
pub struct NinePatch {
    visual: Visual,
    texture: Arc<Texture>,
    state: Mutex<PatchState>,
}

impl NinePatch {
    /// Patch over the whole texture.
    pub fn new(texture: Arc<Texture>, margins: Margins) -> Arc<Self> {
        Self::with_region(texture, Rectangle::default(), margins)
    }

    /// Patch over a pixel region; a zero width or height means the texture's.
    pub fn with_region(texture: Arc<Texture>, region: Rectangle, margins: Margins) -> Arc<Self> {
        let w = if region.width == 0.0 { texture.width() as f32 } else { region.width };
        let h = if region.height == 0.0 { texture.height() as f32 } else { region.height };
        let (x, y) = (region.x, region.y);
        let outer = texture.uv_rect(x, y, x + w, y + h);
        let inner = texture.uv_rect(
            x + margins.left as f32,
            y + margins.top as f32,
            x + w - margins.right as f32,
            y + h - margins.bottom as f32,
        );
        let patch = Arc::new_cyclic(|me: &Weak<NinePatch>| NinePatch {
            visual: Visual::new(me.clone(), 0.0, 0.0, 0.0, 0.0),
            texture,
            state: Mutex::new(PatchState {
                outer,
                inner,
                margins,
                flip_horizontal: false,
                flip_vertical: false,
                quads: vertex::create_set(9),
                dataset: None,
                dirty: false,
            }),
        });
        {
            let mut state = patch.lock();
            patch.update_vertices(&mut state);
        }
        patch
    }

    fn lock(&self) -> MutexGuard<'_, PatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    pub fn margins(&self) -> Margins {
        self.lock().margins
    }

    pub fn margin_hor(&self) -> u32 {
        let m = self.margins();
        m.left + m.right
    }

    pub fn margin_ver(&self) -> u32 {
        let m = self.margins();
        m.top + m.bottom
    }

    pub fn inner_width(&self) -> f32 {
        self.visual.lock().width - self.margin_hor() as f32
    }

    pub fn inner_height(&self) -> f32 {
        self.visual.lock().height - self.margin_ver() as f32
    }

    pub fn inner_right(&self) -> f32 {
        self.visual.lock().width - self.margins().right as f32
    }

    pub fn inner_bottom(&self) -> f32 {
        self.visual.lock().height - self.margins().bottom as f32
    }

    pub fn set_flip_horizontal(&self, value: bool) {
        let mut state = self.lock();
        if state.flip_horizontal != value {
            state.flip_horizontal = value;
            self.update_vertices(&mut state);
        }
    }

    pub fn set_flip_vertical(&self, value: bool) {
        let mut state = self.lock();
        if state.flip_vertical != value {
            state.flip_vertical = value;
            self.update_vertices(&mut state);
        }
    }

    pub fn size(&self, width: f32, height: f32) {
        let mut state = self.lock();
        {
            let mut visual = self.visual.lock();
            visual.width = width;
            visual.height = height;
        }
        self.update_vertices(&mut state);
    }

    pub fn quads(&self) -> Vec<f32> {
        self.lock().quads.clone()
    }

    fn update_vertices(&self, state: &mut PatchState) {
        let (width, height) = {
            let v = self.visual.lock();
            (v.width, v.height)
        };
        let m = state.margins;
        let (ml, mt) = (m.left as f32, m.top as f32);
        let right = width - m.right as f32;
        let bottom = height - m.bottom as f32;

        let (o, i) = (state.outer, state.inner);
        let (out_l, out_r, in_l, in_r) = if state.flip_horizontal {
            (o.right(), o.left(), i.right(), i.left())
        } else {
            (o.left(), o.right(), i.left(), i.right())
        };
        let (out_t, out_b, in_t, in_b) = if state.flip_vertical {
            (o.bottom(), o.top(), i.bottom(), i.top())
        } else {
            (o.top(), o.bottom(), i.top(), i.bottom())
        };

        let columns = [(0.0, ml, out_l, in_l), (ml, right, in_l, in_r), (right, width, in_r, out_r)];
        let rows = [(0.0, mt, out_t, in_t), (mt, bottom, in_t, in_b), (bottom, height, in_b, out_b)];
        let mut at = 0;
        for &(y1, y2, v1, v2) in &rows {
            for &(x1, x2, u1, u2) in &columns {
                let quad = vertex::fill_quad(x1, x2, y1, y2, u1, u2, v1, v2);
                state.quads[at..at + FLOATS_PER_QUAD].copy_from_slice(&quad);
                at += FLOATS_PER_QUAD;
            }
        }
        state.dirty = true;
    }
}

impl Gizmo for NinePatch {
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
        let model = self.visual.refresh_matrix();
        if state.dirty {
            match state.dataset.as_ref() {
                Some(dataset) => dataset.mark_for_update(Some(&state.quads)),
                None => state.dataset = Some(gfx.create_dataset(&state.quads)),
            }
            state.dirty = false;
        }
        let color = self.visual.color();
        gfx.bind_texture(&self.texture);
        gfx.set_camera(self.visual.core().camera().as_ref());
        gfx.set_model(&model);
        gfx.lighting(color.mult(), color.add());
        if let Some(dataset) = &state.dataset {
            gfx.draw_quad_set(dataset, 9, 0);
        }
    }

    fn destroy(&self) {
        self.visual.core().detach();
        self.lock().dataset = None;
    }

    fn is_visible(&self) -> bool {
        self.visual.is_visible()
    }
}

impl VisualGizmo for NinePatch {
    fn visual(&self) -> &Visual {
        &self.visual
    }
}
