use std::sync::{Mutex, PoisonError};

/// Sink for recoverable-but-severe failures (shader link errors, audio
/// playback errors). Reporting never aborts the caller.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &anyhow::Error);
}

/// Default reporter: writes the full error chain at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, context: &str, error: &anyhow::Error) {
        log::error!("{context}: {error:#}");
    }
}

/// Keeps every report in memory. Also forwards to the log so nothing is lost
/// when used outside of tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    entries: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, context: &str, error: &anyhow::Error) {
        log::error!("{context}: {error:#}");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{context}: {error:#}"));
    }
}
