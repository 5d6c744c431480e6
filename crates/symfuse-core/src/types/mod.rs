//! # Types
//!
//! Domain types shared by the reconciliation engine and the build pipeline.

pub mod artifacts;
pub mod destination;
pub mod uuid;

// Re-export all public types
pub use artifacts::{DebugInfoBundle, SymbolMapFile, SYMBOL_MAP_EXTENSION};
pub use destination::{ArchiveDestination, ArchiveLayout, PackageLayout};
pub use uuid::SliceUuid;
