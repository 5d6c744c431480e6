use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use symfuse_core::config::CONFIG_FILE_NAME;
use symfuse_core::maps::discover_symbol_maps;
use symfuse_core::prelude::*;
use symfuse_core::types::SYMBOL_MAP_EXTENSION;
use symfuse_utils::{info, init_logging_with_options, warn, LogFormat, LogLevel};

/// Exit status when the operator interrupts a run (128 + SIGINT)
const EXIT_INTERRUPTED: i32 = 130;

/// Builds iOS xcframeworks and reconciles bitcode symbol maps with their dSYMs.
#[derive(Parser, Debug)]
#[command(name = "symfuse")]
#[command(version)]
#[command(about = "Builds iOS xcframeworks and reconciles bitcode symbol maps with their dSYMs", long_about = None)]
struct Cli
{
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format (pretty or json); overrides SYMFUSE_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Archive every destination, assemble the xcframework and reconcile symbol maps
    Run
    {
        /// Pipeline configuration file
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Override the configured missing-map policy (flagged, always, never)
        #[arg(long)]
        policy: Option<MissingMapPolicy>,
        /// Reuse existing archives and package; only reconcile
        #[arg(long, default_value_t = false)]
        skip_build: bool,
    },
    /// Reconcile one dSYM with a directory of symbol maps
    Reconcile
    {
        /// dSYM bundle produced by the archive build
        #[arg(long)]
        bundle: PathBuf,
        /// Directory searched recursively for symbol maps
        #[arg(long)]
        maps: PathBuf,
        /// dSYM bundle to repair (copied from --bundle when missing)
        #[arg(long)]
        dest_bundle: PathBuf,
        /// Directory that receives the consumed symbol maps
        #[arg(long)]
        dest_maps: PathBuf,
        /// The variant was built with bitcode, so missing maps are an error
        #[arg(long, default_value_t = false)]
        expects_maps: bool,
        /// Missing-map policy (flagged, always, never)
        #[arg(long, default_value = "flagged")]
        policy: MissingMapPolicy,
        /// UUID source (dwarfdump or macho)
        #[arg(long, default_value = "dwarfdump")]
        source: IdentifierSourceKind,
        /// Symbol map file extension
        #[arg(long, default_value = SYMBOL_MAP_EXTENSION)]
        extension: String,
        /// Variant name used in logs and errors
        #[arg(long, default_value = "custom")]
        variant: String,
    },
    /// Print the slice UUIDs of a dSYM bundle or Mach-O file
    Uuids
    {
        /// dSYM bundle or Mach-O file
        bundle: PathBuf,
        /// UUID source (dwarfdump or macho)
        #[arg(long, default_value = "dwarfdump")]
        source: IdentifierSourceKind,
    },
    /// Show which symbol maps belong to a dSYM without copying or repairing
    Match
    {
        /// dSYM bundle or Mach-O file
        bundle: PathBuf,
        /// Directory searched recursively for symbol maps
        maps: PathBuf,
        /// UUID source (dwarfdump or macho)
        #[arg(long, default_value = "dwarfdump")]
        source: IdentifierSourceKind,
        /// Symbol map file extension
        #[arg(long, default_value = SYMBOL_MAP_EXTENSION)]
        extension: String,
    },
}

fn main()
{
    let cli = Cli::parse();

    // Held until exit so file logs are flushed
    let _guard = match init_logging_with_options(cli.log_level, cli.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    let runner = ProcessRunner::new();
    let interrupted = runner.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst)) {
        warn!("Could not install interrupt handler: {}", e);
    }

    if let Err(e) = run_command(cli.command, &runner) {
        print_error(&e);
        let code = if e.is_interrupt() { EXIT_INTERRUPTED } else { 1 };
        process::exit(code);
    }
}

fn print_error(error: &SymfuseError)
{
    eprintln!("Error: {}", error);
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn identifier_source(kind: IdentifierSourceKind, runner: &ProcessRunner) -> Box<dyn IdentifierSource + '_>
{
    match kind {
        IdentifierSourceKind::Dwarfdump => Box::new(DwarfdumpSource::new(runner)),
        IdentifierSourceKind::Macho => Box::new(MachOSource),
    }
}

fn run_command(command: Commands, runner: &ProcessRunner) -> SymfuseResult<()>
{
    match command {
        Commands::Run {
            config,
            policy,
            skip_build,
        } => {
            let mut config = PipelineConfig::load(&config)?;
            if let Some(policy) = policy {
                config.map_policy = policy;
            }
            info!("Running pipeline for {}", config.framework);

            let report = Pipeline::new(config, runner).run(!skip_build)?;
            for variant in &report.variants {
                print_report(variant);
            }
            println!("Package: {}", report.package.display());
            println!("Repaired {} slice(s)", report.repaired_count());
            Ok(())
        }
        Commands::Reconcile {
            bundle,
            maps,
            dest_bundle,
            dest_maps,
            expects_maps,
            policy,
            source,
            extension,
            variant,
        } => {
            let job = ReconcileJob {
                variant,
                source_bundle: bundle,
                map_dir: maps,
                destination_bundle: dest_bundle,
                destination_map_dir: dest_maps,
                expects_symbol_maps: expects_maps,
            };
            let reconciler = Reconciler::new(identifier_source(source, runner), runner)
                .with_policy(policy)
                .with_extension(extension);
            let report = reconciler.reconcile(&job)?;
            print_report(&report);
            Ok(())
        }
        Commands::Uuids { bundle, source } => {
            for uuid in identifier_source(source, runner).identifiers(&bundle)? {
                println!("{}", uuid);
            }
            Ok(())
        }
        Commands::Match {
            bundle,
            maps,
            source,
            extension,
        } => print_matches(&bundle, &maps, &*identifier_source(source, runner), &extension),
    }
}

fn print_matches(bundle: &Path, maps: &Path, source: &dyn IdentifierSource, extension: &str) -> SymfuseResult<()>
{
    let identifiers = source.identifiers(bundle)?;
    let candidates = discover_symbol_maps(maps, extension)?;
    let partition = partition_matches(&identifiers, &candidates);

    for found in &partition.matched {
        println!("matched    {}  {}", found.identifier, found.map.path().display());
    }
    for uuid in &partition.unmatched_identifiers {
        println!("no map     {}", uuid);
    }
    for map in &partition.unmatched_maps {
        println!("unused     {}", map.path().display());
    }
    Ok(())
}

fn print_report(report: &ReconcileReport)
{
    println!("Variant: {}", report.variant);
    if report.skipped {
        println!("  no symbol maps, nothing to repair");
        return;
    }
    for slice in &report.repaired {
        println!("  repaired {}  {}", slice.identifier, slice.map.display());
    }
    for uuid in &report.unmatched_identifiers {
        println!("  no map   {}", uuid);
    }
    for map in &report.unmatched_maps {
        println!("  unused   {}", map.display());
    }
}
