use super::gizmo::{Gizmo, GizmoCore, UpdateContext};
use super::visual::VisualGizmo;
use crate::utils::Position;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Progress curve applied before the action sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ease {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        match self {
            Ease::Linear => t,
            Ease::QuadIn => t * t,
            Ease::QuadOut => t * (2.0 - t),
            Ease::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// What a tweener drives with its progress.
pub enum TweenAction {
    Position {
        target: Arc<dyn VisualGizmo>,
        start: Position,
        end: Position,
    },
    Alpha {
        target: Arc<dyn VisualGizmo>,
        start: f32,
        delta: f32,
    },
    Custom(Box<dyn FnMut(f32) + Send>),
}

impl TweenAction {
    fn apply(&mut self, progress: f32) {
        match self {
            TweenAction::Position { target, start, end } => {
                target.visual().set_point(Position::inter(*start, *end, progress));
            }
            TweenAction::Alpha { target, start, delta } => {
                target.visual().set_alpha(*start + *delta * progress);
            }
            TweenAction::Custom(apply) => apply(progress),
        }
    }
}

type Listener = Box<dyn FnOnce(&Tweener) + Send>;

struct TweenState {
    interval: f32,
    elapsed: f32,
    ease: Ease,
    action: TweenAction,
    listener: Option<Listener>,
}

/// Drives an action from 0 to 1 over `interval` seconds, then calls its
/// listener, dies and leaves its group.
pub struct Tweener {
    core: GizmoCore,
    state: Mutex<TweenState>,
}

impl Tweener {
    pub fn new(action: TweenAction, interval: f32) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Tweener>| Tweener {
            core: GizmoCore::new(me.clone()),
            state: Mutex::new(TweenState {
                interval,
                elapsed: 0.0,
                ease: Ease::Linear,
                action,
                listener: None,
            }),
        })
    }

    /// Moves `target` from where it is now to `to`.
    pub fn position(target: Arc<dyn VisualGizmo>, to: Position, interval: f32) -> Arc<Self> {
        let start = target.visual().point();
        Self::new(
            TweenAction::Position {
                target,
                start,
                end: to,
            },
            interval,
        )
    }

    /// Fades `target` from its current alpha to `alpha`.
    pub fn alpha(target: Arc<dyn VisualGizmo>, alpha: f32, interval: f32) -> Arc<Self> {
        let start = target.visual().alpha();
        Self::new(
            TweenAction::Alpha {
                target,
                start,
                delta: alpha - start,
            },
            interval,
        )
    }

    fn lock(&self) -> MutexGuard<'_, TweenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ease(&self, ease: Ease) {
        self.lock().ease = ease;
    }

    pub fn on_complete(&self, listener: impl FnOnce(&Tweener) + Send + 'static) {
        self.lock().listener = Some(Box::new(listener));
    }

    pub fn elapsed(&self) -> f32 {
        self.lock().elapsed
    }

    /// Completes immediately: listener, kill, detach.
    pub fn finish(&self) {
        let listener = self.lock().listener.take();
        if let Some(listener) = listener {
            listener(self);
        }
        self.kill();
        self.core.detach();
    }
}

impl Gizmo for Tweener {
    fn core(&self) -> &GizmoCore {
        &self.core
    }

    fn update(&self, ctx: &mut UpdateContext<'_>) {
        let dt = ctx.elapsed;
        let done = {
            let mut state = self.lock();
            state.elapsed += dt;
            // A sliver shorter than half a frame would only overshoot.
            if state.interval - state.elapsed < dt / 2.0 {
                state.elapsed = state.interval;
            }
            let done = state.elapsed >= state.interval;
            let progress = if done { 1.0 } else { state.elapsed / state.interval };
            let eased = state.ease.apply(progress);
            state.action.apply(eased);
            done
        };
        if done {
            self.finish();
        }
    }
}
