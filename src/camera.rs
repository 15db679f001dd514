use crate::matrix::Matrix;
use crate::scene::VisualGizmo;
use crate::utils::{Position, Rectangle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A viewport onto the scene: a screen-pixel rectangle, a zoom factor and a
/// scroll offset in camera space.
pub struct Camera {
    state: Mutex<CameraState>,
}

#[derive(Clone)]
pub struct CameraState {
    /// Viewport origin in screen pixels.
    pub x: i32,
    pub y: i32,
    /// Viewport size in camera units.
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
    pub scroll: Position,
    full_screen: bool,
    matrix: Matrix,
    dead_zone: Option<Rectangle>,
    target: Option<Weak<dyn VisualGizmo>>,
}

impl CameraState {
    pub fn screen_width(&self) -> f32 {
        self.width * self.zoom
    }

    pub fn screen_height(&self) -> f32 {
        self.height * self.zoom
    }

    pub fn is_full_screen(&self) -> bool {
        self.full_screen
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Centers the view on `point`.
    pub fn focus_on(&mut self, point: Position) {
        self.scroll = Position::new(point.x - self.width / 2.0, point.y - self.height / 2.0);
    }

    // Nudges the scroll just enough to keep `point` inside the dead zone.
    fn track(&mut self, point: Position) {
        let Some(zone) = self.dead_zone else {
            self.focus_on(point);
            return;
        };
        let zone = Rectangle::new(
            zone.x + self.scroll.x,
            zone.y + self.scroll.y,
            zone.width,
            zone.height,
        );
        let dx_right = point.x - zone.right();
        if dx_right > 0.0 {
            self.scroll.x += dx_right;
        }
        let dx_left = point.x - zone.left();
        if dx_left < 0.0 {
            self.scroll.x += dx_left;
        }
        let dy_bottom = point.y - zone.bottom();
        if dy_bottom > 0.0 {
            self.scroll.y += dy_bottom;
        }
        let dy_top = point.y - zone.top();
        if dy_top < 0.0 {
            self.scroll.y += dy_top;
        }
    }

    fn update_matrix(&mut self, screen_width: f32, screen_height: f32) {
        let sx = 2.0 / screen_width;
        let sy = 2.0 / screen_height;
        let m = &mut self.matrix.values;
        m[0] = self.zoom * sx;
        m[5] = -self.zoom * sy;
        m[12] = -1.0 + self.x as f32 * sx - self.scroll.x * m[0];
        m[13] = 1.0 - self.y as f32 * sy - self.scroll.y * m[5];
    }
}

impl Camera {
    pub fn new(x: i32, y: i32, width: f32, height: f32, zoom: f32) -> Self {
        Self {
            state: Mutex::new(CameraState {
                x,
                y,
                width,
                height,
                zoom,
                scroll: Position::ZERO,
                full_screen: false,
                matrix: Matrix::identity(),
                dead_zone: None,
                target: None,
            }),
        }
    }

    /// Camera covering the whole screen at `zoom`.
    pub fn full_screen(screen_width: f32, screen_height: f32, zoom: f32) -> Self {
        let camera = Self::new(0, 0, screen_width / zoom, screen_height / zoom, zoom);
        {
            let mut state = camera.lock();
            state.full_screen = true;
            state.update_matrix(screen_width, screen_height);
        }
        camera
    }

    pub fn lock(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> CameraState {
        self.lock().clone()
    }

    pub fn matrix(&self) -> Matrix {
        self.lock().matrix
    }

    pub fn scroll(&self) -> Position {
        self.lock().scroll
    }

    pub fn set_scroll(&self, scroll: Position) {
        self.lock().scroll = scroll;
    }

    pub fn is_full_screen(&self) -> bool {
        self.lock().full_screen
    }

    /// Changes zoom while keeping the viewport's screen size.
    pub fn set_zoom(&self, zoom: f32) {
        let mut state = self.lock();
        let (sw, sh) = (state.screen_width(), state.screen_height());
        state.zoom = zoom;
        state.width = sw / zoom;
        state.height = sh / zoom;
    }

    pub fn focus_on(&self, point: Position) {
        self.lock().focus_on(point);
    }

    /// Keeps `target` in view on every update.
    pub fn follow(&self, target: &Arc<dyn VisualGizmo>) {
        self.lock().target = Some(Arc::downgrade(target));
    }

    pub fn stop_following(&self) {
        self.lock().target = None;
    }

    /// Region, relative to the scroll, that a followed target may move in
    /// without the camera scrolling.
    pub fn set_dead_zone(&self, zone: Option<Rectangle>) {
        self.lock().dead_zone = zone;
    }

    pub fn hit_test(&self, x: f32, y: f32) -> bool {
        let state = self.lock();
        let (cx, cy) = (state.x as f32, state.y as f32);
        x >= cx && y >= cy && x < cx + state.screen_width() && y < cy + state.screen_height()
    }

    pub fn screen_to_camera(&self, x: f32, y: f32) -> Position {
        let state = self.lock();
        Position::new(
            (x - state.x as f32) / state.zoom + state.scroll.x,
            (y - state.y as f32) / state.zoom + state.scroll.y,
        )
    }

    pub fn camera_to_screen(&self, x: f32, y: f32) -> Position {
        let state = self.lock();
        Position::new(
            (x - state.scroll.x) * state.zoom + state.x as f32,
            (y - state.scroll.y) * state.zoom + state.y as f32,
        )
    }

    /// Tracks the follow target and rebuilds the view-projection matrix for
    /// a screen of the given size.
    pub fn update(&self, screen_width: f32, screen_height: f32) {
        let target = self.lock().target.as_ref().and_then(Weak::upgrade);
        let focus = target
            .filter(|t| t.is_alive())
            .map(|t| t.visual().lock().center());
        let mut state = self.lock();
        if let Some(point) = focus {
            state.track(point);
        }
        state.full_screen = state.x == 0
            && state.y == 0
            && (state.screen_width() - screen_width).abs() < 0.5
            && (state.screen_height() - screen_height).abs() < 0.5;
        state.update_matrix(screen_width, screen_height);
    }
}

/// The cameras of the current scene. The main camera is the default for
/// gizmos without one of their own.
#[derive(Default)]
pub struct Cameras {
    all: Vec<Arc<Camera>>,
    main: Option<Arc<Camera>>,
}

impl Cameras {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every camera and installs a full-screen main camera.
    pub fn reset(&mut self, screen_width: f32, screen_height: f32) -> Arc<Camera> {
        self.reset_with(Arc::new(Camera::full_screen(screen_width, screen_height, 1.0)))
    }

    pub fn reset_with(&mut self, main: Arc<Camera>) -> Arc<Camera> {
        self.all.clear();
        self.all.push(main.clone());
        self.main = Some(main.clone());
        main
    }

    pub fn add(&mut self, camera: Arc<Camera>) -> Arc<Camera> {
        self.all.push(camera.clone());
        camera
    }

    pub fn remove(&mut self, camera: &Arc<Camera>) {
        self.all.retain(|c| !Arc::ptr_eq(c, camera));
        if self.main.as_ref().is_some_and(|m| Arc::ptr_eq(m, camera)) {
            self.main = None;
        }
    }

    pub fn main(&self) -> Option<Arc<Camera>> {
        self.main.clone()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn update_all(&self, screen_width: f32, screen_height: f32) {
        for camera in &self.all {
            camera.update(screen_width, screen_height);
        }
    }
}
