use super::gizmo::{same_gizmo, Gizmo, GizmoCore, GizmoRef, UpdateContext};
use crate::graphics::Graphics;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Ordered child list of a container. Index 0 is the back; the last child
/// is drawn and updated last.
///
/// Every mutation and every traversal takes the same lock. Traversals copy
/// the list under the lock and walk the copy with the lock released, so a
/// child may restructure its own group (or another thread may) mid-walk.
pub struct Children {
    owner: Weak<dyn Container>,
    list: Mutex<Vec<GizmoRef>>,
}

fn position_of(list: &[GizmoRef], g: &GizmoRef) -> Option<usize> {
    list.iter().position(|c| same_gizmo(&**c, &**g))
}

impl Children {
    pub fn new(owner: Weak<dyn Container>) -> Self {
        Self {
            owner,
            list: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<GizmoRef>> {
        self.list.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<GizmoRef> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, g: &GizmoRef) -> bool {
        position_of(&self.lock(), g).is_some()
    }

    pub fn index_of(&self, g: &GizmoRef) -> Option<usize> {
        position_of(&self.lock(), g)
    }

    pub fn get(&self, index: usize) -> Option<GizmoRef> {
        self.lock().get(index).cloned()
    }

    // Takes `g` away from whichever other group holds it. The caller holds
    // `g`'s membership lock.
    fn adopt(&self, g: &GizmoRef) {
        if let Some(old) = g.core().parent() {
            old.children().remove_child(g);
        }
    }

    fn insert(&self, g: &GizmoRef, front: bool) {
        let mut list = self.lock();
        if position_of(&list, g).is_some() {
            return;
        }
        if front {
            list.push(g.clone());
        } else {
            list.insert(0, g.clone());
        }
        g.core().set_parent(Some(self.owner.clone()));
    }

    // Check, detach and insert as one step per node, so two groups racing
    // for the same node cannot both end up holding it.
    fn attach(&self, g: &GizmoRef, front: bool) {
        let _membership = g.core().lock_membership();
        if g.core().has_parent(&self.owner) {
            return;
        }
        self.adopt(g);
        self.insert(g, front);
    }

    /// Appends `g` unless it is already a child. Returns `g`.
    pub fn add(&self, g: GizmoRef) -> GizmoRef {
        self.attach(&g, true);
        g
    }

    /// Like [`add`](Self::add), but an existing child is moved to the front.
    pub fn add_to_front(&self, g: GizmoRef) -> GizmoRef {
        if g.core().has_parent(&self.owner) {
            self.bring_to_front(&g);
            return g;
        }
        self.add(g)
    }

    pub fn add_to_back(&self, g: GizmoRef) -> GizmoRef {
        if g.core().has_parent(&self.owner) {
            self.send_to_back(&g);
            return g;
        }
        self.attach(&g, false);
        g
    }

    pub fn bring_to_front(&self, g: &GizmoRef) -> bool {
        let mut list = self.lock();
        let Some(index) = position_of(&list, g) else {
            return false;
        };
        let child = list.remove(index);
        list.push(child);
        true
    }

    pub fn send_to_back(&self, g: &GizmoRef) -> bool {
        let mut list = self.lock();
        let Some(index) = position_of(&list, g) else {
            return false;
        };
        let child = list.remove(index);
        list.insert(0, child);
        true
    }

    /// Detaches `g`. Returns it when it was a child.
    pub fn remove(&self, g: &GizmoRef) -> Option<GizmoRef> {
        let _membership = g.core().lock_membership();
        self.remove_child(g)
    }

    fn remove_child(&self, g: &GizmoRef) -> Option<GizmoRef> {
        let mut list = self.lock();
        let index = position_of(&list, g)?;
        let child = list.remove(index);
        child.core().set_parent(None);
        Some(child)
    }

    // A child taken out of the list by `clear` or `destroy` may already
    // have been adopted elsewhere; only a link to this group is cleared.
    fn release(&self, child: &GizmoRef) {
        let _membership = child.core().lock_membership();
        child.core().release_parent(&self.owner);
    }

    /// Detaches every child.
    pub fn clear(&self) {
        let drained: Vec<GizmoRef> = self.lock().drain(..).collect();
        for child in &drained {
            self.release(child);
        }
    }

    pub fn update(&self, ctx: &mut UpdateContext<'_>) {
        for child in self.snapshot() {
            if child.is_alive() && child.is_active() {
                child.update(ctx);
            }
        }
    }

    pub fn draw(&self, gfx: &mut Graphics) {
        for child in self.snapshot() {
            if child.is_alive() && child.is_visible() {
                child.draw(gfx);
            }
        }
    }

    pub fn kill(&self) {
        for child in self.snapshot() {
            if child.is_alive() {
                child.kill();
            }
        }
    }

    /// Destroys children one by one, front of the list first.
    pub fn destroy(&self) {
        loop {
            let next = {
                let mut list = self.lock();
                if list.is_empty() {
                    break;
                }
                list.remove(0)
            };
            self.release(&next);
            next.destroy();
        }
    }

    /// First dead child of type `T`.
    pub fn first_available<T: Gizmo + 'static>(&self) -> Option<Arc<T>> {
        self.snapshot()
            .into_iter()
            .filter(|c| !c.core().local_alive())
            .find_map(|c| c.into_any_arc().downcast::<T>().ok())
    }
}

/// A node that owns children.
pub trait Container: Gizmo {
    fn children(&self) -> &Children;

    fn add(&self, g: GizmoRef) -> GizmoRef {
        self.children().add(g)
    }

    fn add_to_front(&self, g: GizmoRef) -> GizmoRef {
        self.children().add_to_front(g)
    }

    fn add_to_back(&self, g: GizmoRef) -> GizmoRef {
        self.children().add_to_back(g)
    }

    fn bring_to_front(&self, g: &GizmoRef) -> bool {
        self.children().bring_to_front(g)
    }

    fn send_to_back(&self, g: &GizmoRef) -> bool {
        self.children().send_to_back(g)
    }

    fn remove(&self, g: &GizmoRef) -> Option<GizmoRef> {
        self.children().remove(g)
    }

    fn clear(&self) {
        self.children().clear();
    }
}

/// Types a group can construct on demand for pooling.
pub trait Recyclable: Gizmo + Sized + 'static {
    fn create() -> Arc<Self>;
}

pub trait ContainerExt: Container {
    /// Revives and returns the first dead child of type `T`, or creates,
    /// adds and returns a new one.
    fn recycle<T: Recyclable>(&self) -> Arc<T> {
        if let Some(found) = self.children().first_available::<T>() {
            found.revive();
            return found;
        }
        let created = T::create();
        self.add(created.clone());
        created
    }

    fn first_available<T: Gizmo + 'static>(&self) -> Option<Arc<T>> {
        self.children().first_available::<T>()
    }
}

impl<C: Container + ?Sized> ContainerExt for C {}

/// Plain container node.
pub struct Group {
    core: GizmoCore,
    children: Children,
}

impl Group {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Group>| Group {
            core: GizmoCore::new(me.clone()),
            children: Children::new(me.clone()),
        })
    }
}

impl Gizmo for Group {
    fn core(&self) -> &GizmoCore {
        &self.core
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) {
        self.children.update(ctx);
    }

    fn draw(&self, gfx: &mut Graphics) {
        self.children.draw(gfx);
    }

    fn kill(&self) {
        self.children.kill();
        self.core.set_alive(false);
    }

    fn destroy(&self) {
        self.children.destroy();
        self.core.detach();
    }

    fn as_container(&self) -> Option<&dyn Container> {
        Some(self)
    }
}

impl Container for Group {
    fn children(&self) -> &Children {
        &self.children
    }
}

impl Recyclable for Group {
    fn create() -> Arc<Self> {
        Group::new()
    }
}

/// Root of a running game screen.
pub trait Scene: Container {
    /// Builds the scene's content. Called once right after switching.
    fn create(&self, _gfx: &mut Graphics) {}

    /// The host is being paused or backgrounded.
    fn on_pause(&self) {}
}

impl Scene for Group {}
