use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "tessera".to_string(),
            width: 960,
            height: 540,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `env_logger` filter string; falls back to `RUST_LOG`.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetsConfig {
    /// Read-only bundled assets.
    pub root: PathBuf,
    /// Writable per-user storage.
    pub storage: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            storage: PathBuf::from("save"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SavesConfig {
    pub compress: bool,
    /// Relative to the storage root.
    pub dir: PathBuf,
}

impl Default for SavesConfig {
    fn default() -> Self {
        Self {
            compress: crate::bundle::DEFAULT_COMPRESSION,
            dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// RGBA in 0..1.
    pub clear_color: [f32; 4],
    pub bottom_inset: i32,
    pub density: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            bottom_inset: 0,
            density: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeConfig {
    pub scale: f32,
    pub seed: Option<u64>,
    pub freeze_emitters: bool,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            seed: None,
            freeze_emitters: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub logging: LogConfig,
    pub assets: AssetsConfig,
    pub saves: SavesConfig,
    pub render: RenderConfig,
    pub time: TimeConfig,
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_takes_defaults() {
        let config = EngineConfig::from_toml_str("").expect("parse");
        assert_eq!(config, EngineConfig::default());
        assert!(config.saves.compress);
        assert_eq!(config.time.scale, 1.0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [window]
            title = "Dungeon"

            [time]
            freeze_emitters = true
            seed = 42
            "#,
        )
        .expect("parse");
        assert_eq!(config.window.title, "Dungeon");
        assert_eq!(config.window.width, 960);
        assert!(config.time.freeze_emitters);
        assert_eq!(config.time.seed, Some(42));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = EngineConfig::load("/nonexistent/engine.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
