use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read asset {name}: {source}")]
    Asset {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode image {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}
