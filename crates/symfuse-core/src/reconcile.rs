//! # Symbol Reconciliation
//!
//! Pairs a device dSYM with its BCSymbolMaps and repairs the dSYM copy in
//! the final package, so crash reports from bitcode builds symbolicate.
//!
//! For each [`ReconcileJob`]:
//!
//! 1. List the UUIDs of the source dSYM. None at all is fatal
//!    (`NoIdentifiersFound`).
//! 2. Find every symbol map under the job's map directory. Whether finding
//!    none is fatal depends on the [`MissingMapPolicy`]; if it is not, the
//!    job is skipped.
//! 3. Pair UUIDs with maps ([`partition_matches`]).
//! 4. For every pair, copy the map next to the packaged dSYM and run
//!    `dsymutil --symbol-map <map> <dSYM>` on the packaged dSYM.
//!
//! Unmatched maps and unmatched UUIDs are expected and only logged.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use symfuse_core::identifiers::DwarfdumpSource;
//! use symfuse_core::reconcile::{ReconcileJob, Reconciler};
//! use symfuse_core::tool::ProcessRunner;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>>
//! {
//!     let runner = ProcessRunner::new();
//!     let reconciler = Reconciler::new(DwarfdumpSource::new(runner.clone()), runner);
//!     let job = ReconcileJob {
//!         variant: "device".into(),
//!         source_bundle: "build/device.xcarchive/dSYMs/MySDK.framework.dSYM".into(),
//!         map_dir: "build/device.xcarchive/BCSymbolMaps".into(),
//!         destination_bundle: "build/MySDK.xcframework/ios-arm64/dSYMs/MySDK.framework.dSYM".into(),
//!         destination_map_dir: "build/MySDK.xcframework/ios-arm64/BCSymbolMaps".into(),
//!         expects_symbol_maps: true,
//!     };
//!     let report = reconciler.reconcile(&job)?;
//!     println!("repaired {} slice(s)", report.repaired.len());
//!     Ok(())
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span};
use walkdir::WalkDir;

use crate::error::{SymfuseError, SymfuseResult};
use crate::identifiers::IdentifierSource;
use crate::maps::discover_symbol_maps;
use crate::matching::{partition_matches, SymbolMatch};
use crate::policy::MissingMapPolicy;
use crate::tool::{ToolCommand, ToolRunner};
use crate::types::{SliceUuid, SYMBOL_MAP_EXTENSION};

/// Inputs for reconciling one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileJob
{
    /// Variant name, for logs and errors
    pub variant: String,
    /// dSYM produced by the archive build
    pub source_bundle: PathBuf,
    /// Directory searched (recursively) for symbol maps
    pub map_dir: PathBuf,
    /// dSYM inside the package that gets repaired
    pub destination_bundle: PathBuf,
    /// Where consumed maps are copied
    pub destination_map_dir: PathBuf,
    /// Whether this variant is built with bitcode
    pub expects_symbol_maps: bool,
}

/// One repaired slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedSlice
{
    pub identifier: SliceUuid,
    /// The copied map inside the package
    pub map: PathBuf,
    /// The repaired dSYM
    pub bundle: PathBuf,
}

/// Outcome of one [`Reconciler::reconcile`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport
{
    pub variant: String,
    /// Every UUID found in the source dSYM
    pub identifiers: Vec<SliceUuid>,
    pub repaired: Vec<RepairedSlice>,
    pub unmatched_identifiers: Vec<SliceUuid>,
    pub unmatched_maps: Vec<PathBuf>,
    /// True when no maps were found and the policy allowed that
    pub skipped: bool,
}

/// The reconciliation engine
///
/// `S` lists UUIDs, `R` runs the repair tool.
#[derive(Debug, Clone)]
pub struct Reconciler<S, R>
{
    source: S,
    runner: R,
    policy: MissingMapPolicy,
    extension: String,
    repair_tool: String,
}

impl<S: IdentifierSource, R: ToolRunner> Reconciler<S, R>
{
    pub fn new(source: S, runner: R) -> Self
    {
        Self {
            source,
            runner,
            policy: MissingMapPolicy::default(),
            extension: SYMBOL_MAP_EXTENSION.to_string(),
            repair_tool: "dsymutil".to_string(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MissingMapPolicy) -> Self
    {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self
    {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_repair_tool(mut self, program: impl Into<String>) -> Self
    {
        self.repair_tool = program.into();
        self
    }

    pub fn policy(&self) -> MissingMapPolicy
    {
        self.policy
    }

    /// `dsymutil --symbol-map <map> <bundle>`
    pub fn repair_command(&self, bundle: &Path, map: &Path) -> ToolCommand
    {
        ToolCommand::new(&self.repair_tool)
            .arg("--symbol-map")
            .arg(map)
            .arg(bundle)
    }

    /// Reconcile one variant
    ///
    /// ## Errors
    ///
    /// - `NoIdentifiersFound` if the source dSYM has no UUIDs
    /// - `NoSymbolMapsFound` if no maps exist and the policy requires them
    /// - `ExternalToolFailure`, `Io`, `Walk` from the underlying operations
    pub fn reconcile(&self, job: &ReconcileJob) -> SymfuseResult<ReconcileReport>
    {
        let _span = info_span!("reconcile", variant = %job.variant).entered();

        let identifiers = self.source.identifiers(&job.source_bundle)?;
        if identifiers.is_empty() {
            return Err(SymfuseError::NoIdentifiersFound {
                bundle: job.source_bundle.clone(),
            });
        }
        debug!(count = identifiers.len(), "source bundle UUIDs");

        let mut report = ReconcileReport {
            variant: job.variant.clone(),
            identifiers,
            ..ReconcileReport::default()
        };

        let candidates = discover_symbol_maps(&job.map_dir, &self.extension)?;
        if candidates.is_empty() {
            if self.policy.requires_maps(job.expects_symbol_maps) {
                return Err(SymfuseError::NoSymbolMapsFound {
                    variant: job.variant.clone(),
                    directory: job.map_dir.clone(),
                });
            }
            info!(policy = %self.policy, "no symbol maps, skipping reconciliation");
            report.skipped = true;
            report.unmatched_identifiers.clone_from(&report.identifiers);
            return Ok(report);
        }

        let partition = partition_matches(&report.identifiers, &candidates);
        for identifier in &partition.unmatched_identifiers {
            debug!(%identifier, "no symbol map for UUID");
        }
        for map in &partition.unmatched_maps {
            debug!(map = %map.path().display(), "symbol map matches no UUID");
        }

        if !partition.matched.is_empty() {
            ensure_bundle(&job.source_bundle, &job.destination_bundle)?;
            fs::create_dir_all(&job.destination_map_dir)?;
        }
        for pair in &partition.matched {
            report.repaired.push(self.repair(job, pair)?);
        }

        report.unmatched_identifiers = partition.unmatched_identifiers;
        report.unmatched_maps = partition
            .unmatched_maps
            .iter()
            .map(|map| map.path().to_path_buf())
            .collect();

        info!(
            repaired = report.repaired.len(),
            unmatched_maps = report.unmatched_maps.len(),
            unmatched_uuids = report.unmatched_identifiers.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    fn repair(&self, job: &ReconcileJob, pair: &SymbolMatch) -> SymfuseResult<RepairedSlice>
    {
        let copied = job.destination_map_dir.join(pair.map.file_name());
        // fs::copy truncates an existing file
        fs::copy(pair.map.path(), &copied)?;

        self.runner
            .run_checked(&self.repair_command(&job.destination_bundle, &copied))?;
        info!(identifier = %pair.identifier, map = %copied.display(), "repaired dSYM slice");

        Ok(RepairedSlice {
            identifier: pair.identifier,
            map: copied,
            bundle: job.destination_bundle.clone(),
        })
    }
}

/// Copy the source dSYM into the package when assembly did not already.
fn ensure_bundle(source: &Path, destination: &Path) -> SymfuseResult<()>
{
    if destination.exists() || source == destination || !source.exists() {
        return Ok(());
    }
    debug!(from = %source.display(), to = %destination.display(), "copying dSYM into package");
    copy_tree(source, destination)
}

fn copy_tree(source: &Path, destination: &Path) -> SymfuseResult<()>
{
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use std::cell::RefCell;

    use super::*;
    use crate::tool::ToolOutput;

    struct FixedSource(Vec<SliceUuid>);

    impl IdentifierSource for FixedSource
    {
        fn identifiers(&self, _bundle: &Path) -> SymfuseResult<Vec<SliceUuid>>
        {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<ToolCommand>>);

    impl ToolRunner for Recorder
    {
        fn run(&self, command: &ToolCommand) -> SymfuseResult<ToolOutput>
        {
            self.0.borrow_mut().push(command.clone());
            Ok(ToolOutput::success_with(""))
        }
    }

    fn job(root: &Path, expects: bool) -> ReconcileJob
    {
        ReconcileJob {
            variant: "device".to_string(),
            source_bundle: root.join("src/MySDK.framework.dSYM"),
            map_dir: root.join("maps"),
            destination_bundle: root.join("pkg/MySDK.framework.dSYM"),
            destination_map_dir: root.join("pkg/BCSymbolMaps"),
            expects_symbol_maps: expects,
        }
    }

    #[test]
    fn test_repair_command_shape()
    {
        let reconciler = Reconciler::new(FixedSource(vec![]), Recorder::default()).with_repair_tool("xcrun-dsymutil");
        let command = reconciler.repair_command(Path::new("/pkg/A.dSYM"), Path::new("/pkg/maps/X.bcsymbolmap"));
        assert_eq!(command.program(), "xcrun-dsymutil");
        assert_eq!(command.arg_strings(), vec!["--symbol-map", "/pkg/maps/X.bcsymbolmap", "/pkg/A.dSYM"]);
    }

    #[test]
    fn test_empty_identifiers_fail_before_enumeration()
    {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let reconciler = Reconciler::new(FixedSource(vec![]), &recorder);

        let err = reconciler.reconcile(&job(dir.path(), true)).unwrap_err();
        assert!(matches!(err, SymfuseError::NoIdentifiersFound { .. }));
        assert!(recorder.0.borrow().is_empty());
        assert!(!dir.path().join("pkg").exists());
    }

    #[test]
    fn test_unflagged_variant_without_maps_is_skipped()
    {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();
        let uuid: SliceUuid = "A5CD23BB-91EF-39A0-8235-9C72BD77B2D7".parse().unwrap();
        let reconciler = Reconciler::new(FixedSource(vec![uuid]), &recorder);

        let report = reconciler.reconcile(&job(dir.path(), false)).unwrap();
        assert!(report.skipped);
        assert!(report.repaired.is_empty());
        assert_eq!(report.unmatched_identifiers, vec![uuid]);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn test_copy_tree_copies_nested_files()
    {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("A.dSYM");
        fs::create_dir_all(source.join("Contents/Resources/DWARF")).unwrap();
        fs::write(source.join("Contents/Info.plist"), "plist").unwrap();
        fs::write(source.join("Contents/Resources/DWARF/A"), "dwarf").unwrap();

        let destination = dir.path().join("pkg/A.dSYM");
        ensure_bundle(&source, &destination).unwrap();
        assert_eq!(fs::read_to_string(destination.join("Contents/Resources/DWARF/A")).unwrap(), "dwarf");
        assert_eq!(fs::read_to_string(destination.join("Contents/Info.plist")).unwrap(), "plist");
    }
}
