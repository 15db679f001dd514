use crate::camera::Camera;
use crate::graphics::Graphics;
use crate::scene::group::Container;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tessera_game_core::RngStream;

pub type GizmoRef = Arc<dyn Gizmo>;

/// Per-frame inputs handed down the tree by `update`.
pub struct UpdateContext<'a> {
    /// Scaled seconds since the previous frame.
    pub elapsed: f32,
    /// Scaled seconds since the game started.
    pub time_total: f32,
    pub freeze_emitters: bool,
    pub rng: &'a mut RngStream,
}

impl<'a> UpdateContext<'a> {
    pub fn new(elapsed: f32, rng: &'a mut RngStream) -> Self {
        Self {
            elapsed,
            time_total: 0.0,
            freeze_emitters: false,
            rng,
        }
    }
}

/// Downcasting support for trait objects in the tree.
pub trait AsAnyArc {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// State every tree node carries: the three local flags, the non-owning
/// parent link, an optional camera and a weak handle to the node itself.
pub struct GizmoCore {
    alive: AtomicBool,
    active: AtomicBool,
    visible: AtomicBool,
    parent: Mutex<Option<Weak<dyn Container>>>,
    // Held across a whole move between groups. Taken before any group's
    // child list lock.
    membership: Mutex<()>,
    camera: Mutex<Option<Arc<Camera>>>,
    this: Weak<dyn Gizmo>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GizmoCore {
    /// `this` must point at the node that owns the core; build it inside
    /// `Arc::new_cyclic`.
    pub fn new(this: Weak<dyn Gizmo>) -> Self {
        Self {
            alive: AtomicBool::new(true),
            active: AtomicBool::new(true),
            visible: AtomicBool::new(true),
            parent: Mutex::new(None),
            membership: Mutex::new(()),
            camera: Mutex::new(None),
            this,
        }
    }

    pub fn this(&self) -> Option<GizmoRef> {
        self.this.upgrade()
    }

    pub fn parent(&self) -> Option<Arc<dyn Container>> {
        lock(&self.parent).as_ref().and_then(Weak::upgrade)
    }

    pub fn has_parent(&self, group: &Weak<dyn Container>) -> bool {
        lock(&self.parent)
            .as_ref()
            .is_some_and(|p| std::ptr::addr_eq(p.as_ptr(), group.as_ptr()))
    }

    pub(crate) fn set_parent(&self, parent: Option<Weak<dyn Container>>) {
        *lock(&self.parent) = parent;
    }

    /// Clears the parent link only if it still points at `group`.
    pub(crate) fn release_parent(&self, group: &Weak<dyn Container>) {
        let mut parent = lock(&self.parent);
        if parent.as_ref().is_some_and(|p| std::ptr::addr_eq(p.as_ptr(), group.as_ptr())) {
            *parent = None;
        }
    }

    pub(crate) fn lock_membership(&self) -> MutexGuard<'_, ()> {
        lock(&self.membership)
    }

    pub fn local_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn local_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn local_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn set_alive(&self, value: bool) {
        self.alive.store(value, Ordering::Release);
    }

    pub fn set_active(&self, value: bool) {
        self.active.store(value, Ordering::Release);
    }

    pub fn set_visible(&self, value: bool) {
        self.visible.store(value, Ordering::Release);
    }

    /// Local flag and the parent's effective flag.
    pub fn is_alive(&self) -> bool {
        self.local_alive() && self.parent().map_or(true, |p| p.is_alive())
    }

    pub fn is_active(&self) -> bool {
        self.local_active() && self.parent().map_or(true, |p| p.is_active())
    }

    pub fn is_visible(&self) -> bool {
        self.local_visible() && self.parent().map_or(true, |p| p.is_visible())
    }

    /// Own camera, else the nearest ancestor's.
    pub fn camera(&self) -> Option<Arc<Camera>> {
        if let Some(camera) = lock(&self.camera).clone() {
            return Some(camera);
        }
        self.parent().and_then(|p| p.camera())
    }

    pub fn set_camera(&self, camera: Option<Arc<Camera>>) {
        *lock(&self.camera) = camera;
    }

    /// Removes the node from its parent's children, if any.
    pub fn detach(&self) {
        let (Some(parent), Some(this)) = (self.parent(), self.this()) else {
            return;
        };
        parent.children().remove(&this);
    }
}

/// A node of the scene tree. Nodes live behind `Arc` and mutate through
/// interior locks so that a logic thread may restructure groups while the
/// render thread walks them.
pub trait Gizmo: AsAnyArc + Send + Sync {
    fn core(&self) -> &GizmoCore;

    /// Called every frame while effectively alive and active.
    fn update(&self, _ctx: &mut UpdateContext<'_>) {}

    /// Called every frame while effectively alive and visible.
    fn draw(&self, _gfx: &mut Graphics) {}

    /// Marks the node dead. It stays in its group for recycling.
    fn kill(&self) {
        self.core().set_alive(false);
    }

    fn revive(&self) {
        self.core().set_alive(true);
    }

    /// Detaches the node and lets go of its resources.
    fn destroy(&self) {
        self.core().detach();
    }

    fn is_alive(&self) -> bool {
        self.core().is_alive()
    }

    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    fn is_visible(&self) -> bool {
        self.core().is_visible()
    }

    fn camera(&self) -> Option<Arc<Camera>> {
        self.core().camera()
    }

    fn as_container(&self) -> Option<&dyn Container> {
        None
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Node identity, ignoring vtables.
pub fn same_gizmo(a: &dyn Gizmo, b: &dyn Gizmo) -> bool {
    std::ptr::addr_eq(a as *const dyn Gizmo, b as *const dyn Gizmo)
}
