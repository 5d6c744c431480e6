//! # symfuse-core
//!
//! BCSymbolMap-to-dSYM reconciliation and the xcframework build pipeline.
//!
//! This crate provides:
//! - Slice UUID extraction from dSYM bundles (`dwarfdump` or native Mach-O)
//! - Symbol-map discovery and UUID matching
//! - The reconciliation engine that copies maps into the package and
//!   repairs the packaged dSYMs
//! - A sequential archive → assemble → reconcile pipeline
//!
//! ## External tools
//!
//! All Apple tooling (`xcodebuild`, `dwarfdump`, `dsymutil`) is reached
//! through the [`tool::ToolRunner`] trait. Tests substitute a recording
//! runner; the CLI uses [`tool::ProcessRunner`].

pub mod config;
pub mod error;
pub mod identifiers;
pub mod maps;
pub mod matching;
pub mod pipeline;
pub mod policy;
pub mod prelude;
pub mod reconcile;
pub mod tool;
pub mod types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{SymfuseError, SymfuseResult};
pub use pipeline::{Pipeline, PipelineReport};
pub use reconcile::{ReconcileJob, ReconcileReport, Reconciler};
pub use types::SliceUuid;
