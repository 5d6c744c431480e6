//! # Error Types
//!
//! Error handling for symbol reconciliation and the build pipeline.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for symfuse operations
///
/// Every variant is fatal to the pipeline. The only outcomes that are
/// tolerated (unmatched symbol maps and unmatched UUIDs) are not errors and
/// are reported through [`crate::reconcile::ReconcileReport`] instead.
///
/// ## Error Categories
///
/// 1. **Reconciliation errors**: NoIdentifiersFound, NoSymbolMapsFound
/// 2. **Tool errors**: ExternalToolFailure, Interrupted
/// 3. **Input errors**: InvalidIdentifier, InvalidObject
/// 4. **Configuration errors**: InvalidConfig, ConfigParse
/// 5. **I/O errors**: Io, Walk
#[derive(Error, Debug)]
pub enum SymfuseError
{
    /// A debug-info bundle carried no UUIDs at all
    ///
    /// Every dSYM holds at least one slice, and every slice has a UUID.
    /// An empty set means the bundle is corrupt or belongs to a different
    /// build.
    #[error("No UUIDs found in debug-info bundle {}", .bundle.display())]
    NoIdentifiersFound
    {
        /// The bundle that was inspected
        bundle: PathBuf,
    },

    /// Symbol maps were required but the map directory had none
    ///
    /// Bitcode that ships without its symbol maps can never be symbolicated
    /// later, so this aborts the build.
    #[error("No symbol maps found for variant '{variant}' in {}", .directory.display())]
    NoSymbolMapsFound
    {
        /// Name of the destination variant
        variant: String,
        /// The directory that was searched
        directory: PathBuf,
    },

    /// An external tool exited unsuccessfully
    ///
    /// `output` is the tool's captured stderr followed by its stdout,
    /// unmodified.
    #[error("{tool} failed ({}):\n{output}", describe_status(.status))]
    ExternalToolFailure
    {
        /// Program name as invoked
        tool: String,
        /// Exit code, or `None` when the tool was killed by a signal
        status: Option<i32>,
        /// Captured diagnostic output
        output: String,
    },

    /// The operator interrupted a running tool
    #[error("Interrupted while running {tool}")]
    Interrupted
    {
        /// Program name as invoked
        tool: String,
    },

    /// A string that should have been a UUID was not one
    #[error("Invalid UUID: {0}")]
    InvalidIdentifier(String),

    /// A file looked like Mach-O but could not be parsed
    #[error("Invalid Mach-O file {}: {message}", .path.display())]
    InvalidObject
    {
        /// File that failed to parse
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },

    /// Configuration is structurally valid TOML but semantically wrong
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file is not valid TOML for the expected schema
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error (copying maps, reading bundles, spawning tools)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while walking a directory tree
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

fn describe_status(status: &Option<i32>) -> String
{
    match status {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl SymfuseError
{
    /// Whether this error came from an operator interrupt
    #[must_use]
    pub fn is_interrupt(&self) -> bool
    {
        matches!(self, SymfuseError::Interrupted { .. })
    }
}

/// Convenience type alias for `Result<T, SymfuseError>`
///
/// ```rust
/// use symfuse_core::error::SymfuseResult;
/// fn foo() -> SymfuseResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type SymfuseResult<T> = std::result::Result<T, SymfuseError>;
