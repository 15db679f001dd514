//! Retained-mode 2D engine for tile-based games: a scene tree of textured
//! quads rendered through a small GPU surface, with save-game bundles and
//! a frame driver that survives graphics context loss.

#[cfg(feature = "backend-wgpu")]
pub mod app;
pub mod bundle;
pub mod camera;
pub mod config;
pub mod error;
pub mod game;
pub mod gpu;
pub mod graphics;
pub mod logging;
pub mod matrix;
pub mod pixmap;
pub mod scene;
pub mod script;
pub mod texture;
pub mod utils;
pub mod vertex;

#[cfg(feature = "backend-wgpu")]
pub use app::{run_app, TesseraApp};
pub use bundle::{Bundlable, Bundle, BundleError};
pub use camera::{Camera, Cameras};
pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use game::{Game, SceneChange, SceneFactory};
pub use graphics::{Graphics, Screen};
pub use matrix::Matrix;
pub use texture::{Texture, TextureCache, TextureKey, TextureSource};
pub use vertex::{VertexDataset, VertexRegistry};

pub use tessera_game_audio as audio;
pub use tessera_game_core as game_core;
