//! Debug artifacts produced by the compiler: dSYM bundles and BCSymbolMaps.

use std::path::{Path, PathBuf};

use super::uuid::SliceUuid;

/// Directory inside a dSYM holding the per-binary DWARF payloads
pub const DWARF_SUBPATH: &str = "Contents/Resources/DWARF";

/// Default BCSymbolMap file extension
pub const SYMBOL_MAP_EXTENSION: &str = "bcsymbolmap";

/// A `.dSYM` bundle on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfoBundle
{
    path: PathBuf,
}

impl DebugInfoBundle
{
    pub fn new(path: impl Into<PathBuf>) -> Self
    {
        Self { path: path.into() }
    }

    /// `<dSYMs>/<framework>.framework.dSYM`
    pub fn for_framework(dsyms_dir: &Path, framework: &str) -> Self
    {
        Self::new(dsyms_dir.join(format!("{framework}.framework.dSYM")))
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    pub fn dwarf_dir(&self) -> PathBuf
    {
        self.path.join(DWARF_SUBPATH)
    }

    pub fn exists(&self) -> bool
    {
        self.path.exists()
    }
}

/// A BCSymbolMap whose file stem is the UUID of the slice it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMapFile
{
    path: PathBuf,
    identifier: String,
}

impl SymbolMapFile
{
    /// Build from a path, deriving the identifier from the file stem.
    ///
    /// Returns `None` when the path has no UTF-8 file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self>
    {
        let path = path.into();
        let identifier = path.file_stem()?.to_str()?.to_uppercase();
        Some(Self { path, identifier })
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// Upper-cased file stem
    pub fn identifier(&self) -> &str
    {
        &self.identifier
    }

    /// File name including extension, used when copying into the package
    pub fn file_name(&self) -> &std::ffi::OsStr
    {
        self.path.file_name().unwrap_or_default()
    }

    /// Whether this map belongs to the slice with `uuid`
    pub fn belongs_to(&self, uuid: &SliceUuid) -> bool
    {
        uuid.matches_str(&self.identifier)
    }
}
