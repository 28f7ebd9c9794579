//! Application state for the dermascan server.
//!
//! Holds the shared inference engine for the process lifetime. A `None`
//! engine means the startup model load failed: the server keeps running
//! so the health endpoint can report unready instead of crash-looping.

use std::sync::Arc;
use std::time::Instant;

use dermascan::Engine;

/// Shared application state
pub struct AppState {
    /// The loaded inference engine; `None` when the startup load failed
    pub engine: Option<Arc<Engine>>,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Option<Arc<Engine>>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }

    /// Readiness signal: model and preprocessor finished initializing
    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
