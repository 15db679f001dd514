use crate::config::LogConfig;
use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the global logger. Later calls are ignored.
///
/// The filter uses `env_logger` syntax, e.g. `"info,wgpu_core=warn"`.
pub fn init_logging(config: &LogConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        if let Some(filter) = &config.filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
        }
        // Tests may have installed a logger already.
        if builder.try_init().is_err() {
            return;
        }
        log::debug!("logging initialized");
    });
}
