use super::gizmo::{Gizmo, GizmoCore, UpdateContext};
use super::group::{Children, Container, Recyclable};
use super::visual::VisualGizmo;
use crate::gpu::BlendMode;
use crate::graphics::Graphics;
use crate::utils::Rectangle;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Creates particles for an [`Emitter`], usually by recycling children of
/// the emitter itself.
pub trait Factory: Send + Sync {
    fn emit(&self, emitter: &Emitter, index: usize, x: f32, y: f32);

    /// Particles of this factory draw with additive blending.
    fn light_mode(&self) -> bool {
        false
    }
}

impl<F> Factory for F
where
    F: Fn(&Emitter, usize, f32, f32) + Send + Sync,
{
    fn emit(&self, emitter: &Emitter, index: usize, x: f32, y: f32) {
        self(emitter, index, x, y)
    }
}

struct EmitterState {
    area: Rectangle,
    target: Option<Weak<dyn VisualGizmo>>,
    fill_target: bool,
    interval: f32,
    quantity: usize,
    on: bool,
    started: bool,
    auto_kill: bool,
    count: usize,
    time: f32,
    phase_pending: bool,
    light_mode: bool,
    factory: Option<Arc<dyn Factory>>,
}

/// Particle source. Emits through its factory on a fixed interval while
/// `on`, then kills itself once stopped and out of particles.
pub struct Emitter {
    core: GizmoCore,
    children: Children,
    state: Mutex<EmitterState>,
}

impl Emitter {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Emitter>| Emitter {
            core: GizmoCore::new(me.clone()),
            children: Children::new(me.clone()),
            state: Mutex::new(EmitterState {
                area: Rectangle::default(),
                target: None,
                fill_target: true,
                interval: 0.0,
                quantity: 0,
                on: false,
                started: false,
                auto_kill: true,
                count: 0,
                time: 0.0,
                phase_pending: false,
                light_mode: false,
                factory: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn inside a fixed rectangle (a point when zero-sized).
    pub fn pos(&self, x: f32, y: f32, width: f32, height: f32) {
        let mut state = self.lock();
        state.area = Rectangle::new(x, y, width, height);
        state.target = None;
    }

    /// Spawn relative to `target`. With `fill_target` set, the target's own
    /// bounds are used and the rectangle size is ignored.
    pub fn pos_target(&self, target: &Arc<dyn VisualGizmo>, x: f32, y: f32, width: f32, height: f32) {
        let mut state = self.lock();
        state.area = Rectangle::new(x, y, width, height);
        state.target = Some(Arc::downgrade(target));
    }

    pub fn set_fill_target(&self, fill: bool) {
        self.lock().fill_target = fill;
    }

    pub fn set_auto_kill(&self, auto_kill: bool) {
        self.lock().auto_kill = auto_kill;
    }

    pub fn is_on(&self) -> bool {
        self.lock().on
    }

    /// Stops (or resumes) emission without resetting the counter.
    pub fn set_on(&self, on: bool) {
        self.lock().on = on;
    }

    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn count(&self) -> usize {
        self.lock().count
    }

    pub fn in_light_mode(&self) -> bool {
        self.lock().light_mode
    }

    /// `quantity` particles on the next update.
    pub fn burst(&self, factory: Arc<dyn Factory>, quantity: usize) {
        self.start(factory, 0.0, quantity);
    }

    /// One particle per `interval` until stopped.
    pub fn pour(&self, factory: Arc<dyn Factory>, interval: f32) {
        self.start(factory, interval, 0);
    }

    /// Starts emitting. A `quantity` of 0 means unbounded. The first update
    /// picks a random phase inside the interval.
    pub fn start(&self, factory: Arc<dyn Factory>, interval: f32, quantity: usize) {
        let mut state = self.lock();
        state.started = true;
        state.light_mode = factory.light_mode();
        state.factory = Some(factory);
        state.interval = interval;
        state.quantity = quantity;
        state.count = 0;
        state.time = 0.0;
        state.phase_pending = true;
        state.on = true;
    }

    // Indices to emit this tick, advancing the clock and counter.
    fn tick(state: &mut EmitterState, ctx: &mut UpdateContext<'_>) -> Vec<usize> {
        if state.phase_pending {
            state.time = ctx.rng.float(state.interval);
            state.phase_pending = false;
        }
        state.time += ctx.elapsed;
        let mut emitted = Vec::new();
        if state.interval <= 0.0 && state.quantity == 0 {
            // Unbounded zero-interval pour: one per tick.
            if state.time > state.interval {
                emitted.push(state.count);
                state.count += 1;
                state.time = 0.0;
            }
            return emitted;
        }
        while state.time > state.interval {
            state.time -= state.interval;
            emitted.push(state.count);
            state.count += 1;
            if state.quantity > 0 && state.count >= state.quantity {
                state.on = false;
                break;
            }
        }
        emitted
    }

    fn spawn_area(state: &EmitterState) -> Rectangle {
        let target = state.target.as_ref().and_then(Weak::upgrade);
        match target {
            Some(target) => {
                let v = target.visual().lock();
                if state.fill_target {
                    Rectangle::new(v.x, v.y, v.width, v.height)
                } else {
                    Rectangle::new(v.x + state.area.x, v.y + state.area.y, state.area.width, state.area.height)
                }
            }
            None => state.area,
        }
    }
}

impl Gizmo for Emitter {
    fn core(&self) -> &GizmoCore {
        &self.core
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) {
        if ctx.freeze_emitters && ctx.time_total > 1.0 {
            return;
        }
        let mut state = self.lock();
        if state.on {
            let indices = Self::tick(&mut state, ctx);
            let area = Self::spawn_area(&state);
            let factory = state.factory.clone();
            drop(state);
            if let Some(factory) = factory {
                for index in indices {
                    let x = area.x + ctx.rng.float(area.width);
                    let y = area.y + ctx.rng.float(area.height);
                    factory.emit(self, index, x, y);
                }
            }
        } else {
            let finished = state.started && state.auto_kill;
            drop(state);
            if finished && self.children.is_empty() {
                self.kill();
            }
        }
        self.children.update(ctx);
    }

    fn draw(&self, gfx: &mut Graphics) {
        if self.in_light_mode() {
            gfx.set_blend(BlendMode::Additive);
            self.children.draw(gfx);
            gfx.set_blend(BlendMode::Normal);
        } else {
            self.children.draw(gfx);
        }
    }

    fn kill(&self) {
        self.children.kill();
        self.core.set_alive(false);
    }

    fn revive(&self) {
        self.lock().started = false;
        self.core.set_alive(true);
    }

    fn destroy(&self) {
        self.children.destroy();
        self.core.detach();
    }

    fn as_container(&self) -> Option<&dyn Container> {
        Some(self)
    }
}

impl Container for Emitter {
    fn children(&self) -> &Children {
        &self.children
    }
}

impl Recyclable for Emitter {
    fn create() -> Arc<Self> {
        Emitter::new()
    }
}
