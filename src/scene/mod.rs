//! Retained-mode scene tree: gizmos, groups and the renderables built on
//! them.

mod emitter;
mod gizmo;
pub mod graph;
mod group;
mod image;
mod nine_patch;
mod tweener;
mod visual;

pub use emitter::{Emitter, Factory};
pub use gizmo::{same_gizmo, AsAnyArc, Gizmo, GizmoCore, GizmoRef, UpdateContext};
pub use group::{Children, Container, ContainerExt, Group, Recyclable, Scene};
pub use image::Image;
pub use nine_patch::{Margins, NinePatch};
pub use tweener::{Ease, TweenAction, Tweener};
pub use visual::{ColorTransform, Visual, VisualGizmo, VisualState};
