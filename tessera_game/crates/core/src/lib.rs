#![forbid(unsafe_code)]

//! Platform plumbing shared by the engine and the audio crate: the error
//! reporter, asset/storage access and deterministic random streams.

pub mod diagnostics;
pub mod files;
pub mod rng;

pub use diagnostics::{CollectingReporter, ErrorReporter, LogReporter};
pub use files::{AssetSource, DirAssets, MemoryAssets, Storage};
pub use rng::{RngService, RngStream, RngStreamId};
