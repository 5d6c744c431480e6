//! Common module for library exports

pub use crate::config::{PipelineConfig, ToolPaths};
pub use crate::error::{SymfuseError, SymfuseResult};
pub use crate::identifiers::{DwarfdumpSource, IdentifierSource, IdentifierSourceKind, MachOSource};
pub use crate::matching::{partition_matches, MatchPartition};
pub use crate::pipeline::{Pipeline, PipelineReport};
pub use crate::policy::MissingMapPolicy;
pub use crate::reconcile::{ReconcileJob, ReconcileReport, Reconciler};
pub use crate::tool::{ProcessRunner, ToolCommand, ToolOutput, ToolRunner};
pub use crate::types::{ArchiveDestination, DebugInfoBundle, SliceUuid, SymbolMapFile};
