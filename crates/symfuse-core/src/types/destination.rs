//! # Archive Destinations
//!
//! A destination is one build variant of the SDK. The pipeline archives
//! each destination separately and then merges the frameworks into a single
//! xcframework, so each destination also names the slice directory its
//! files land in inside the package.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::artifacts::DebugInfoBundle;

/// One build variant (device, simulator, ...)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveDestination
{
    /// Short name used in logs and errors (`device`, `simulator`)
    pub name: String,
    /// Value passed to `xcodebuild -destination`
    pub platform: String,
    /// Location of the `.xcarchive`, relative to the build root unless absolute
    pub archive_path: PathBuf,
    /// Whether bitcode symbol maps must be present for this variant
    #[serde(default)]
    pub expects_symbol_maps: bool,
    /// Slice directory inside the xcframework (`ios-arm64`)
    pub architecture: String,
}

impl ArchiveDestination
{
    /// The physical-device variant. Only this one produces BCSymbolMaps.
    pub fn device() -> Self
    {
        Self {
            name: "device".to_string(),
            platform: "generic/platform=iOS".to_string(),
            archive_path: PathBuf::from("device.xcarchive"),
            expects_symbol_maps: true,
            architecture: "ios-arm64".to_string(),
        }
    }

    /// The simulator variant.
    pub fn simulator() -> Self
    {
        Self {
            name: "simulator".to_string(),
            platform: "generic/platform=iOS Simulator".to_string(),
            archive_path: PathBuf::from("simulator.xcarchive"),
            expects_symbol_maps: false,
            architecture: "ios-arm64_x86_64-simulator".to_string(),
        }
    }

    /// Archive location with relative paths resolved against `build_root`
    pub fn archive_in(&self, build_root: &Path) -> PathBuf
    {
        if self.archive_path.is_absolute() {
            self.archive_path.clone()
        } else {
            build_root.join(&self.archive_path)
        }
    }
}

/// Paths inside one destination's `.xcarchive`
#[derive(Debug, Clone)]
pub struct ArchiveLayout
{
    root: PathBuf,
    framework: String,
}

impl ArchiveLayout
{
    pub fn new(root: impl Into<PathBuf>, framework: impl Into<String>) -> Self
    {
        Self {
            root: root.into(),
            framework: framework.into(),
        }
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    /// `Products/Library/Frameworks/<framework>.framework`
    pub fn framework(&self) -> PathBuf
    {
        self.root
            .join("Products/Library/Frameworks")
            .join(format!("{}.framework", self.framework))
    }

    /// `dSYMs/<framework>.framework.dSYM`
    pub fn debug_info(&self) -> DebugInfoBundle
    {
        DebugInfoBundle::for_framework(&self.root.join("dSYMs"), &self.framework)
    }

    /// `BCSymbolMaps/`
    pub fn symbol_maps(&self) -> PathBuf
    {
        self.root.join("BCSymbolMaps")
    }
}

/// Paths inside the assembled xcframework
#[derive(Debug, Clone)]
pub struct PackageLayout
{
    root: PathBuf,
    framework: String,
}

impl PackageLayout
{
    /// `<package_dir>/<framework>.xcframework`
    pub fn new(package_dir: &Path, framework: impl Into<String>) -> Self
    {
        let framework = framework.into();
        Self {
            root: package_dir.join(format!("{framework}.xcframework")),
            framework,
        }
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    pub fn slice_dir(&self, architecture: &str) -> PathBuf
    {
        self.root.join(architecture)
    }

    /// `<architecture>/dSYMs/<framework>.framework.dSYM`
    pub fn debug_info(&self, architecture: &str) -> DebugInfoBundle
    {
        DebugInfoBundle::for_framework(&self.slice_dir(architecture).join("dSYMs"), &self.framework)
    }

    /// `<architecture>/BCSymbolMaps/`
    pub fn symbol_maps(&self, architecture: &str) -> PathBuf
    {
        self.slice_dir(architecture).join("BCSymbolMaps")
    }
}
