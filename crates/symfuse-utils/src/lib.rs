//! # symfuse utilities
//!
//! Shared utilities and logging for symfuse.
//!
//! Logging is built on `tracing`; see [`logging`] for the environment
//! variables it understands.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, init_logging_with_options, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
