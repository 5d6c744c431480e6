//! # Build Pipeline
//!
//! Archives every destination, merges the frameworks into one xcframework,
//! then reconciles each destination's symbol maps with the packaged dSYMs.
//!
//! Stages run strictly one after another and the first failure aborts the
//! whole run; there are no retries. A half-assembled debug package is worse
//! than a failed build because the damage only shows up later, during crash
//! triage.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tracing::{info, info_span, warn};

use crate::config::PipelineConfig;
use crate::error::{SymfuseError, SymfuseResult};
use crate::identifiers::{DwarfdumpSource, IdentifierSource, IdentifierSourceKind, MachOSource};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::tool::{ToolCommand, ToolRunner};
use crate::types::ArchiveDestination;

/// Settings every archive needs to produce a distributable framework
const BASE_BUILD_SETTINGS: &[(&str, &str)] = &[("SKIP_INSTALL", "NO"), ("BUILD_LIBRARY_FOR_DISTRIBUTION", "YES")];

/// Outcome of a full run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport
{
    /// The assembled `.xcframework`
    pub package: PathBuf,
    /// One report per destination, in configuration order
    pub variants: Vec<ReconcileReport>,
}

impl PipelineReport
{
    pub fn repaired_count(&self) -> usize
    {
        self.variants.iter().map(|v| v.repaired.len()).sum()
    }
}

/// Drives the external tools for one configuration
pub struct Pipeline<R>
{
    config: PipelineConfig,
    runner: R,
}

impl<R: ToolRunner> Pipeline<R>
{
    pub fn new(config: PipelineConfig, runner: R) -> Self
    {
        Self { config, runner }
    }

    pub fn config(&self) -> &PipelineConfig
    {
        &self.config
    }

    /// `xcodebuild archive` for one destination
    ///
    /// ## Errors
    ///
    /// Returns `InvalidConfig` when neither or both of project/workspace are
    /// configured.
    pub fn archive_command(&self, destination: &ArchiveDestination) -> SymfuseResult<ToolCommand>
    {
        let reference = self.config.project_reference().ok_or_else(|| {
            SymfuseError::InvalidConfig("exactly one of 'project' or 'workspace' must be set".to_string())
        })?;

        let mut settings: BTreeMap<&str, &str> = BASE_BUILD_SETTINGS.iter().copied().collect();
        if destination.expects_symbol_maps {
            settings.insert("ENABLE_BITCODE", "YES");
        }
        for (key, value) in &self.config.build_settings {
            settings.insert(key, value);
        }

        let archive = self.config.archive_layout(destination);
        Ok(ToolCommand::new(&self.config.tools.xcodebuild)
            .arg("archive")
            .arg(reference.flag())
            .arg(reference.path())
            .arg("-scheme")
            .arg(self.config.scheme())
            .arg("-configuration")
            .arg(&self.config.configuration)
            .arg("-destination")
            .arg(&destination.platform)
            .arg("-archivePath")
            .arg(archive.root())
            .args(settings.iter().map(|(key, value)| format!("{key}={value}"))))
    }

    /// `xcodebuild -create-xcframework` over every destination
    ///
    /// dSYMs are attached only when present on disk.
    pub fn assemble_command(&self) -> ToolCommand
    {
        let mut command = ToolCommand::new(&self.config.tools.xcodebuild).arg("-create-xcframework");
        for destination in &self.config.destinations {
            let archive = self.config.archive_layout(destination);
            command = command.arg("-framework").arg(archive.framework());

            let debug_info = archive.debug_info();
            if debug_info.exists() {
                command = command.arg("-debug-symbols").arg(debug_info.path());
            } else {
                warn!(variant = %destination.name, dsym = %debug_info.path().display(), "no dSYM to attach");
            }
        }
        command
            .arg("-output")
            .arg(self.config.package_layout().root())
    }

    /// Archive every destination in order
    ///
    /// ## Errors
    ///
    /// Stops at the first failing archive.
    pub fn archive_all(&self) -> SymfuseResult<()>
    {
        for destination in &self.config.destinations {
            let _span = info_span!("archive", variant = %destination.name).entered();
            info!(platform = %destination.platform, "archiving");
            self.runner.run_checked(&self.archive_command(destination)?)?;
        }
        Ok(())
    }

    /// Assemble the xcframework, replacing a stale one
    ///
    /// ## Errors
    ///
    /// `Io` if the old package cannot be removed, `ExternalToolFailure` if
    /// assembly fails.
    pub fn assemble(&self) -> SymfuseResult<PathBuf>
    {
        let package = self.config.package_layout();
        if package.root().exists() {
            info!(package = %package.root().display(), "removing stale package");
            fs::remove_dir_all(package.root())?;
        }
        fs::create_dir_all(&self.config.package_dir)?;

        info!(package = %package.root().display(), "assembling xcframework");
        self.runner.run_checked(&self.assemble_command())?;
        Ok(package.root().to_path_buf())
    }

    fn identifier_source(&self) -> Box<dyn IdentifierSource + '_>
    {
        match self.config.identifier_source {
            IdentifierSourceKind::Dwarfdump => {
                Box::new(DwarfdumpSource::with_program(&self.runner, &self.config.tools.dwarfdump))
            }
            IdentifierSourceKind::Macho => Box::new(MachOSource),
        }
    }

    /// Reconcile every destination in order
    ///
    /// ## Errors
    ///
    /// Stops at the first fatal reconciliation error.
    pub fn reconcile_all(&self) -> SymfuseResult<Vec<ReconcileReport>>
    {
        let reconciler = Reconciler::new(self.identifier_source(), &self.runner)
            .with_policy(self.config.map_policy)
            .with_extension(&self.config.symbol_map_extension)
            .with_repair_tool(&self.config.tools.dsymutil);

        self.config
            .destinations
            .iter()
            .map(|destination| reconciler.reconcile(&self.config.reconcile_job(destination)))
            .collect()
    }

    /// Run the pipeline
    ///
    /// With `build == false` the archive and assembly stages are skipped and
    /// existing artifacts are reconciled.
    ///
    /// ## Errors
    ///
    /// Any error from any stage; the run stops there.
    pub fn run(&self, build: bool) -> SymfuseResult<PipelineReport>
    {
        self.config.validate(build)?;

        let package = if build {
            self.archive_all()?;
            self.assemble()?
        } else {
            self.config.package_layout().root().to_path_buf()
        };

        let variants = self.reconcile_all()?;
        let report = PipelineReport { package, variants };
        info!(
            package = %report.package.display(),
            repaired = report.repaired_count(),
            "pipeline finished"
        );
        Ok(report)
    }
}
