//! Workshop Pilot - persona-driven workshop simulation
//!
//! This is the main entry point for the workshop-pilot binary.
//! `run` simulates personas through the stage catalog and writes one
//! artifact per persona; `aggregate` turns those artifacts into the final
//! report.

mod advisory;
mod analysis;
mod cli;
mod config;
mod error;
mod logging;
mod orchestrator;
mod persona;
mod simulator;
mod stages;
mod types;
mod version;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::advisory::AdvisoryClient;
use crate::cli::{Cli, Commands, ConfigSubcommand, RunArgs};
use crate::config::PilotConfig;
use crate::error::{Error, Result};
use crate::logging::LogGuards;
use crate::orchestrator::{ArtifactStore, GroupOrchestrator, RunSummary, ThrottledBackend};
use crate::persona::{DigitalMaturity, PersonaRegistry};
use crate::simulator::{CancelFlag, StageSimulator};
use crate::stages::StageCatalog;
use crate::types::FinalReport;

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    }
}

/// Dispatch a command, returning the process exit code
fn execute(cli: Cli) -> Result<i32> {
    let (verbose, quiet) = (cli.verbose, cli.quiet);

    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(0)
        }
        Commands::Config { subcommand } => handle_config_command(subcommand),
        Commands::Personas { config, maturity } => {
            let config = PilotConfig::load(config.as_deref())?;
            list_personas(&config, maturity)?;
            Ok(0)
        }
        Commands::Stages { config } => {
            let config = PilotConfig::load(config.as_deref())?;
            list_stages(&config)?;
            Ok(0)
        }
        Commands::Run(args) => {
            let config = load_run_config(&args)?;
            let _log_guards = init_logging(&config, verbose, quiet)?;
            run_pilot(config, &args, quiet)
        }
        Commands::Aggregate {
            config,
            output,
            no_markdown,
        } => {
            let mut config = PilotConfig::load(config.as_deref())?;
            if let Some(dir) = output {
                config.storage.output_dir = dir;
            }
            if no_markdown {
                config.analysis.write_markdown = false;
            }
            let _log_guards = init_logging(&config, verbose, quiet)?;
            let catalog = StageCatalog::load(config.storage.stages_file.as_deref())?;
            let store = ArtifactStore::new(config.output_dir());
            let report = analysis::generate_report(&store, &catalog, &config.analysis)?;
            if !quiet {
                print_report_summary(&report, &store);
            }
            Ok(0)
        }
    }
}

/// Load config and layer the `run` flags on top
fn load_run_config(args: &RunArgs) -> Result<PilotConfig> {
    let mut config = PilotConfig::load(args.config.as_deref())?;
    if let Some(k) = args.group_size {
        config.orchestrator.group_size = k;
    }
    if let Some(ref dir) = args.output {
        config.storage.output_dir = dir.clone();
    }
    if let Some(provider) = args.backend {
        config.advisory.provider = provider;
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &PilotConfig, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let guards = logging::init_logging(&config.logging, verbose, quiet)?;
    let build = version::BuildInfo::current();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        log_level = %guards.level,
        "Starting workshop-pilot"
    );
    Ok(guards)
}

/// Simulate the selected personas and write their artifacts
fn run_pilot(config: PilotConfig, args: &RunArgs, quiet: bool) -> Result<i32> {
    let registry = PersonaRegistry::load(config.storage.personas_file.as_deref())?;
    let catalog = Arc::new(StageCatalog::load(config.storage.stages_file.as_deref())?);
    let personas = registry.select(&args.personas, args.maturity, args.count)?;
    if personas.is_empty() {
        return Err(Error::config_validation("No personas match the selection"));
    }

    info!(
        provider = %config.advisory.provider,
        model = %config.advisory.model,
        personas = personas.len(),
        stages = catalog.len(),
        output = %config.storage.output_dir,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(1, 8))
        .thread_name("workshop-pilot")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let store = ArtifactStore::new(config.output_dir());
    let summary = runtime.block_on(async {
        let backend = advisory::create_backend(&config.advisory)?;
        let throttled = Arc::new(ThrottledBackend::from_settings(backend, &config.orchestrator));
        let client = Arc::new(AdvisoryClient::from_settings(throttled, &config.advisory));
        let simulator = Arc::new(StageSimulator::new(client, catalog.clone(), config.simulation.clone()));
        let orchestrator = GroupOrchestrator::new(simulator, store.clone(), config.orchestrator.clone());

        // Ctrl+C stops new personas and stages; calls in flight finish
        let cancel = CancelFlag::new();
        let signal_flag = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight stages");
                signal_flag.cancel();
            }
        });

        orchestrator.run(&personas, &cancel).await
    })?;

    if !quiet {
        print_run_summary(&summary, &store);
    }

    if args.report && !summary.cancelled {
        let report = analysis::generate_report(&store, &catalog, &config.analysis)?;
        if !quiet {
            print_report_summary(&report, &store);
        }
    }

    Ok(summary.exit_code())
}

fn print_run_summary(summary: &RunSummary, store: &ArtifactStore) {
    println!();
    println!("Pilot run {}", summary.run_id);
    println!("  Groups:        {}", summary.groups.len());
    println!("  Personas:      {}", summary.persona_count());
    println!("  Completed:     {}", summary.completed);
    println!("  Dropped out:   {}", summary.dropped_out);
    println!("  Errored:       {}", summary.errored);
    println!("  Interrupted:   {}", summary.interrupted);
    if summary.not_started > 0 {
        println!("  Not started:   {}", summary.not_started);
    }
    println!("  Degraded:      {} stage results", summary.degraded_results);
    println!("  Artifacts in:  {}", store.root().display());
}

fn print_report_summary(report: &FinalReport, store: &ArtifactStore) {
    println!();
    println!("Final report ({} personas, {} skipped artifacts)", report.totals.personas, report.skipped_artifacts.len());
    if let Some(avg) = report.totals.average_satisfaction {
        println!("  Average satisfaction: {:.2}", avg);
    }
    for stage in &report.problematic_stages {
        println!(
            "  #{} Stage {} {} ({:.2})",
            stage.rank, stage.stage_number, stage.stage_name, stage.composite_satisfaction
        );
    }
    println!("  Written to: {}", store.root().join(orchestrator::store::REPORT_JSON_FILE).display());
}

fn list_personas(config: &PilotConfig, maturity: Option<DigitalMaturity>) -> Result<()> {
    let registry = PersonaRegistry::load(config.storage.personas_file.as_deref())?;
    let personas = registry.select(&[], maturity, None)?;

    println!("{:<6} {:<14} {:<24} {:>5}  Maturity", "ID", "Name", "Department", "Team");
    for p in &personas {
        println!(
            "{:<6} {:<14} {:<24} {:>5}  {}",
            p.id, p.name, p.department, p.team_size, p.digital_maturity
        );
    }
    println!();
    println!("{} personas", personas.len());
    Ok(())
}

fn list_stages(config: &PilotConfig) -> Result<()> {
    let catalog = StageCatalog::load(config.storage.stages_file.as_deref())?;
    for stage in catalog.all() {
        println!("{:>2}. {} ({:.0} min)", stage.number, stage.name, stage.expected_minutes);
    }
    println!();
    println!("{} stages, {:.0} minutes expected", catalog.len(), catalog.expected_total_minutes());
    Ok(())
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<i32> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let mut cfg = PilotConfig::load(config.as_deref())?;
            if !cfg.advisory.api_key.is_empty() {
                cfg.advisory.api_key = "********".to_string();
            }
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let path = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", path.display());
        }
        ConfigSubcommand::Validate { config } => {
            PilotConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(0)
}
