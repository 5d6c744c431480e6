//! # Configuration
//!
//! Everything the pipeline needs to know is carried in a [`PipelineConfig`]
//! value, loaded from `symfuse.toml` and passed down explicitly. Nothing is
//! read from process-wide state, so several pipelines with different roots
//! can run side by side (as the tests do).
//!
//! ## Example
//!
//! ```toml
//! framework = "MySDK"
//! project = "MySDK.xcodeproj"
//! map_policy = "flagged"
//!
//! [build_settings]
//! SWIFT_SERIALIZE_DEBUGGING_OPTIONS = "NO"
//!
//! [[destinations]]
//! name = "device"
//! platform = "generic/platform=iOS"
//! archive_path = "device.xcarchive"
//! expects_symbol_maps = true
//! architecture = "ios-arm64"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{SymfuseError, SymfuseResult};
use crate::identifiers::IdentifierSourceKind;
use crate::policy::MissingMapPolicy;
use crate::reconcile::ReconcileJob;
use crate::types::{ArchiveDestination, ArchiveLayout, PackageLayout, SYMBOL_MAP_EXTENSION};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "symfuse.toml";

/// Program names of the external tools
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths
{
    pub xcodebuild: String,
    pub dwarfdump: String,
    pub dsymutil: String,
}

impl Default for ToolPaths
{
    fn default() -> Self
    {
        Self {
            xcodebuild: "xcodebuild".to_string(),
            dwarfdump: "dwarfdump".to_string(),
            dsymutil: "dsymutil".to_string(),
        }
    }
}

/// The Xcode container that holds the scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectReference
{
    Project(PathBuf),
    Workspace(PathBuf),
}

impl ProjectReference
{
    /// `xcodebuild` flag selecting this kind of container
    pub fn flag(&self) -> &'static str
    {
        match self {
            ProjectReference::Project(_) => "-project",
            ProjectReference::Workspace(_) => "-workspace",
        }
    }

    pub fn path(&self) -> &Path
    {
        match self {
            ProjectReference::Project(path) | ProjectReference::Workspace(path) => path,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig
{
    /// Framework (and product) name
    pub framework: String,
    /// Scheme to archive; defaults to the framework name
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub project: Option<PathBuf>,
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    #[serde(default = "default_configuration")]
    pub configuration: String,
    /// Where archives are written
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,
    /// Where the xcframework is assembled
    #[serde(default = "default_package_dir")]
    pub package_dir: PathBuf,
    #[serde(default)]
    pub map_policy: MissingMapPolicy,
    #[serde(default = "default_extension")]
    pub symbol_map_extension: String,
    #[serde(default)]
    pub identifier_source: IdentifierSourceKind,
    #[serde(default)]
    pub tools: ToolPaths,
    /// Extra `KEY=VALUE` overrides passed to every archive build
    #[serde(default)]
    pub build_settings: BTreeMap<String, String>,
    #[serde(default = "default_destinations")]
    pub destinations: Vec<ArchiveDestination>,
}

fn default_configuration() -> String
{
    "Release".to_string()
}

fn default_build_root() -> PathBuf
{
    PathBuf::from("build")
}

fn default_package_dir() -> PathBuf
{
    PathBuf::from("build/package")
}

fn default_extension() -> String
{
    SYMBOL_MAP_EXTENSION.to_string()
}

fn default_destinations() -> Vec<ArchiveDestination>
{
    vec![ArchiveDestination::device(), ArchiveDestination::simulator()]
}

fn resolve(base: &Path, path: &mut PathBuf)
{
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl PipelineConfig
{
    /// Configuration with defaults for everything but the framework name
    pub fn new(framework: impl Into<String>) -> Self
    {
        Self {
            framework: framework.into(),
            scheme: None,
            project: None,
            workspace: None,
            configuration: default_configuration(),
            build_root: default_build_root(),
            package_dir: default_package_dir(),
            map_policy: MissingMapPolicy::default(),
            symbol_map_extension: default_extension(),
            identifier_source: IdentifierSourceKind::default(),
            tools: ToolPaths::default(),
            build_settings: BTreeMap::new(),
            destinations: default_destinations(),
        }
    }

    /// Parse TOML text. Relative paths are left untouched.
    ///
    /// ## Errors
    ///
    /// Returns `ConfigParse` for malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> SymfuseResult<Self>
    {
        Ok(toml::from_str(text)?)
    }

    /// Load a file and resolve relative paths against its directory
    ///
    /// ## Errors
    ///
    /// Returns `Io` if the file cannot be read and `ConfigParse` if it
    /// cannot be parsed.
    pub fn load(path: &Path) -> SymfuseResult<Self>
    {
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        debug!(path = %path.display(), framework = %config.framework, "loaded configuration");
        Ok(config)
    }

    /// Make every relative path absolute with respect to `base`
    pub fn resolve_paths(&mut self, base: &Path)
    {
        resolve(base, &mut self.build_root);
        resolve(base, &mut self.package_dir);
        if let Some(project) = self.project.as_mut() {
            resolve(base, project);
        }
        if let Some(workspace) = self.workspace.as_mut() {
            resolve(base, workspace);
        }
    }

    /// Check semantic constraints
    ///
    /// `building` additionally requires exactly one of `project`/`workspace`.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidConfig` describing the first violation.
    pub fn validate(&self, building: bool) -> SymfuseResult<()>
    {
        let invalid = |msg: String| Err(SymfuseError::InvalidConfig(msg));

        if self.framework.trim().is_empty() {
            return invalid("framework name is empty".to_string());
        }
        if self.symbol_map_extension.trim_start_matches('.').is_empty() {
            return invalid("symbol_map_extension is empty".to_string());
        }
        if self.destinations.is_empty() {
            return invalid("no destinations configured".to_string());
        }

        let mut names = HashSet::new();
        for destination in &self.destinations {
            if !names.insert(destination.name.as_str()) {
                return invalid(format!("duplicate destination '{}'", destination.name));
            }
            if destination.architecture.is_empty() {
                return invalid(format!("destination '{}' has no architecture label", destination.name));
            }
        }

        if building && self.project_reference().is_none() {
            return invalid("exactly one of 'project' or 'workspace' must be set to build archives".to_string());
        }
        Ok(())
    }

    pub fn scheme(&self) -> &str
    {
        self.scheme.as_deref().unwrap_or(&self.framework)
    }

    /// The project or workspace, if exactly one is configured
    pub fn project_reference(&self) -> Option<ProjectReference>
    {
        match (&self.project, &self.workspace) {
            (Some(project), None) => Some(ProjectReference::Project(project.clone())),
            (None, Some(workspace)) => Some(ProjectReference::Workspace(workspace.clone())),
            _ => None,
        }
    }

    pub fn archive_layout(&self, destination: &ArchiveDestination) -> ArchiveLayout
    {
        ArchiveLayout::new(destination.archive_in(&self.build_root), &self.framework)
    }

    pub fn package_layout(&self) -> PackageLayout
    {
        PackageLayout::new(&self.package_dir, &self.framework)
    }

    /// Reconciliation inputs for one destination
    pub fn reconcile_job(&self, destination: &ArchiveDestination) -> ReconcileJob
    {
        let archive = self.archive_layout(destination);
        let package = self.package_layout();
        ReconcileJob {
            variant: destination.name.clone(),
            source_bundle: archive.debug_info().path().to_path_buf(),
            map_dir: archive.symbol_maps(),
            destination_bundle: package.debug_info(&destination.architecture).path().to_path_buf(),
            destination_map_dir: package.symbol_maps(&destination.architecture),
            expects_symbol_maps: destination.expects_symbol_maps,
        }
    }
}
