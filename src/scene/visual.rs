use super::gizmo::{Gizmo, GizmoCore, UpdateContext};
use super::group::Recyclable;
use crate::camera::Camera;
use crate::graphics::Graphics;
use crate::matrix::Matrix;
use crate::utils::{Color, Position};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Per-channel color transform applied by the quad shader:
/// `out = in * mult + add`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    pub rm: f32,
    pub gm: f32,
    pub bm: f32,
    pub am: f32,
    pub ra: f32,
    pub ga: f32,
    pub ba: f32,
    pub aa: f32,
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self {
            rm: 1.0,
            gm: 1.0,
            bm: 1.0,
            am: 1.0,
            ra: 0.0,
            ga: 0.0,
            ba: 0.0,
            aa: 0.0,
        }
    }
}

impl ColorTransform {
    pub fn mult(&self) -> [f32; 4] {
        [self.rm, self.gm, self.bm, self.am]
    }

    pub fn add(&self) -> [f32; 4] {
        [self.ra, self.ga, self.ba, self.aa]
    }

    fn set_rgb_mult(&mut self, value: f32) {
        self.rm = value;
        self.gm = value;
        self.bm = value;
    }

    fn set_rgb_add(&mut self, r: f32, g: f32, b: f32) {
        self.ra = r;
        self.ga = g;
        self.ba = b;
    }

    /// `am + aa`.
    pub fn alpha(&self) -> f32 {
        self.am + self.aa
    }

    /// Sets `am` and zeroes `aa`.
    pub fn set_alpha(&mut self, value: f32) {
        self.am = value;
        self.aa = 0.0;
    }

    /// Identity transform, fully opaque.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn invert(&mut self) {
        self.set_rgb_mult(-1.0);
        self.set_rgb_add(1.0, 1.0, 1.0);
    }

    /// 0 is black, 0.5 unchanged, 1 white.
    pub fn lightness(&mut self, value: f32) {
        if value < 0.5 {
            self.set_rgb_mult(value * 2.0);
            self.set_rgb_add(0.0, 0.0, 0.0);
        } else {
            let add = value * 2.0 - 1.0;
            self.set_rgb_mult(2.0 - value * 2.0);
            self.set_rgb_add(add, add, add);
        }
    }

    pub fn brightness(&mut self, value: f32) {
        self.set_rgb_mult(value);
    }

    pub fn tint(&mut self, r: f32, g: f32, b: f32, strength: f32) {
        self.set_rgb_mult(1.0 - strength);
        self.set_rgb_add(r * strength, g * strength, b * strength);
    }

    pub fn tint_color(&mut self, color: Color, strength: f32) {
        self.tint(color.r, color.g, color.b, strength);
    }

    /// Tint from `0xAARRGGBB`, the alpha byte giving the strength.
    pub fn tint_argb(&mut self, argb: u32) {
        let strength = ((argb >> 24) & 0xFF) as f32 / 255.0;
        self.tint_color(Color::from_hex(argb & 0xFF_FFFF), strength);
    }

    /// Flat color: multiplier zeroed, color added.
    pub fn color(&mut self, r: f32, g: f32, b: f32) {
        self.set_rgb_mult(0.0);
        self.set_rgb_add(r, g, b);
    }

    pub fn color_hex(&mut self, rgb: u32) {
        let c = Color::from_hex(rgb);
        self.color(c.r, c.g, c.b);
    }

    /// Adds the color. The multiplier is kept as it is, unlike
    /// [`color`](Self::color) which zeroes it.
    pub fn hardlight(&mut self, r: f32, g: f32, b: f32) {
        self.set_rgb_add(r, g, b);
    }

    pub fn hardlight_hex(&mut self, rgb: u32) {
        let c = Color::from_hex(rgb);
        self.hardlight(c.r, c.g, c.b);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TransformKey {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    angle: f32,
    scale: Position,
    origin: Position,
}

/// Transform, motion and color of a visual.
#[derive(Debug, Clone)]
pub struct VisualState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale: Position,
    /// Pivot for rotation and scaling, relative to `(x, y)`.
    pub origin: Position,
    /// Degrees.
    pub angle: f32,
    pub angular_speed: f32,
    pub speed: Position,
    pub acc: Position,
    pub color: ColorTransform,
    matrix: Matrix,
    last: Option<TransformKey>,
    matrix_updates: u64,
}

impl VisualState {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale: Position::new(1.0, 1.0),
            origin: Position::ZERO,
            angle: 0.0,
            angular_speed: 0.0,
            speed: Position::ZERO,
            acc: Position::ZERO,
            color: ColorTransform::default(),
            matrix: Matrix::identity(),
            last: None,
            matrix_updates: 0,
        }
    }

    fn key(&self) -> TransformKey {
        TransformKey {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            angle: self.angle,
            scale: self.scale,
            origin: self.origin,
        }
    }

    /// Rebuilds the model matrix if any transform input changed since the
    /// last call, and returns it.
    pub fn refresh_matrix(&mut self) -> Matrix {
        let key = self.key();
        if self.last != Some(key) {
            self.last = Some(key);
            self.rebuild_matrix();
        }
        self.matrix
    }

    fn rebuild_matrix(&mut self) {
        let m = &mut self.matrix;
        m.set_identity();
        m.translate(self.x, self.y);
        let pivot = !self.origin.is_zero();
        if pivot {
            m.translate(self.origin.x, self.origin.y);
        }
        if self.angle != 0.0 {
            m.rotate(self.angle);
        }
        if self.scale.x != 1.0 || self.scale.y != 1.0 {
            m.scale(self.scale.x, self.scale.y);
        }
        if pivot {
            m.translate(-self.origin.x, -self.origin.y);
        }
        self.matrix_updates += 1;
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// How many times the matrix has been rebuilt.
    pub fn matrix_updates(&self) -> u64 {
        self.matrix_updates
    }

    /// Integrates acceleration, speed and angular speed over `elapsed`.
    pub fn update_motion(&mut self, elapsed: f32) {
        if self.acc.x != 0.0 {
            self.speed.x += self.acc.x * elapsed;
        }
        if self.speed.x != 0.0 {
            self.x += self.speed.x * elapsed;
        }
        if self.acc.y != 0.0 {
            self.speed.y += self.acc.y * elapsed;
        }
        if self.speed.y != 0.0 {
            self.y += self.speed.y * elapsed;
        }
        if self.angular_speed != 0.0 {
            self.angle += self.angular_speed * elapsed;
        }
    }

    pub fn point(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn set_point(&mut self, p: Position) {
        self.x = p.x;
        self.y = p.y;
    }

    pub fn scaled_width(&self) -> f32 {
        self.width * self.scale.x
    }

    pub fn scaled_height(&self) -> f32 {
        self.height * self.scale.y
    }

    pub fn center(&self) -> Position {
        Position::new(
            self.x + self.scaled_width() / 2.0,
            self.y + self.scaled_height() / 2.0,
        )
    }

    pub fn set_center(&mut self, p: Position) {
        self.x = p.x - self.scaled_width() / 2.0;
        self.y = p.y - self.scaled_height() / 2.0;
    }

    /// Position that centers a `width` x `height` box on this one.
    pub fn center_of(&self, width: f32, height: f32) -> Position {
        Position::new(
            self.x + (self.scaled_width() - width) / 2.0,
            self.y + (self.scaled_height() - height) / 2.0,
        )
    }

    pub fn origin_to_center(&mut self) {
        self.origin = Position::new(self.width / 2.0, self.height / 2.0);
    }

    pub fn overlaps_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.scaled_width() && y >= self.y && y < self.y + self.scaled_height()
    }

    pub fn alpha(&self) -> f32 {
        self.color.alpha()
    }

    pub fn set_alpha(&mut self, value: f32) {
        self.color.set_alpha(value);
    }
}

/// Positioned, rotated, scaled and tinted node. Concrete renderables embed a
/// `Visual` and expose it through [`VisualGizmo`].
pub struct Visual {
    core: GizmoCore,
    state: Mutex<VisualState>,
}

impl Visual {
    pub fn new(this: Weak<dyn Gizmo>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            core: GizmoCore::new(this),
            state: Mutex::new(VisualState::new(x, y, width, height)),
        }
    }

    /// Standalone visual with no drawing of its own.
    pub fn create(x: f32, y: f32, width: f32, height: f32) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Visual>| Visual::new(me.clone(), x, y, width, height))
    }

    pub fn core(&self) -> &GizmoCore {
        &self.core
    }

    pub fn lock(&self) -> MutexGuard<'_, VisualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Effectively visible and, when axis aligned, overlapping its camera's
    /// scrolled view. Visuals without any camera are not culled here; see
    /// [`outside_main_view`](Self::outside_main_view).
    pub fn is_visible(&self) -> bool {
        if !self.core.is_visible() {
            return false;
        }
        match self.core.camera() {
            Some(camera) => self.in_view(&camera),
            None => true,
        }
    }

    /// Whether the axis aligned bounds overlap `camera`'s scrolled view.
    /// Rotated visuals always count as in view.
    pub fn in_view(&self, camera: &Camera) -> bool {
        let state = self.lock();
        if state.angle != 0.0 {
            return true;
        }
        let view = camera.snapshot();
        let (w, h) = (state.scaled_width(), state.scaled_height());
        if state.x > view.scroll.x + view.width || state.x + w < view.scroll.x {
            return false;
        }
        if state.y > view.scroll.y + view.height || state.y + h < view.scroll.y {
            return false;
        }
        true
    }

    /// A visual with no camera of its own is drawn through the main camera;
    /// true when it falls outside that camera's view.
    pub fn outside_main_view(&self, gfx: &Graphics) -> bool {
        if self.core.camera().is_some() {
            return false;
        }
        gfx.cameras.main().is_some_and(|main| !self.in_view(&main))
    }

    /// Hit test in screen pixels through the visual's camera.
    pub fn overlaps_screen_point(&self, x: f32, y: f32) -> bool {
        let Some(camera) = self.core.camera() else {
            return false;
        };
        if !camera.hit_test(x, y) {
            return false;
        }
        let p = camera.screen_to_camera(x, y);
        self.lock().overlaps_point(p.x, p.y)
    }

    pub fn update_motion(&self, elapsed: f32) {
        self.lock().update_motion(elapsed);
    }

    pub fn refresh_matrix(&self) -> Matrix {
        self.lock().refresh_matrix()
    }

    pub fn matrix_updates(&self) -> u64 {
        self.lock().matrix_updates()
    }

    pub fn color(&self) -> ColorTransform {
        self.lock().color
    }

    pub fn alpha(&self) -> f32 {
        self.lock().alpha()
    }

    pub fn set_alpha(&self, value: f32) {
        self.lock().set_alpha(value);
    }

    pub fn point(&self) -> Position {
        self.lock().point()
    }

    pub fn set_point(&self, p: Position) {
        self.lock().set_point(p);
    }
}

/// A gizmo built around a [`Visual`].
pub trait VisualGizmo: Gizmo {
    fn visual(&self) -> &Visual;
}

impl Gizmo for Visual {
    fn core(&self) -> &GizmoCore {
        &self.core
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) {
        self.update_motion(ctx.elapsed);
    }

    fn draw(&self, _gfx: &mut Graphics) {
        self.refresh_matrix();
    }

    fn is_visible(&self) -> bool {
        Visual::is_visible(self)
    }
}

impl VisualGizmo for Visual {
    fn visual(&self) -> &Visual {
        self
    }
}

impl Recyclable for Visual {
    fn create() -> Arc<Self> {
        Visual::create(0.0, 0.0, 0.0, 0.0)
    }
}
