//! Utilities: error types and structured logging.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{init_logging, LogConfig, LogLevel};
