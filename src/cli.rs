//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the workshop pilot.

use clap::{Parser, Subcommand};

use crate::config::AdvisoryProvider;
use crate::persona::DigitalMaturity;

/// Workshop Pilot - persona-driven workshop simulation
///
/// Runs synthetic personas through the workshop stages against an advisory
/// service, persists one artifact per persona, and aggregates the artifacts
/// into a ranked final report.
#[derive(Parser, Debug)]
#[command(name = "workshop-pilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate personas through every stage and write artifacts
    Run(RunArgs),

    /// Aggregate existing artifacts into the final report
    Aggregate {
        /// Path to configuration file
        #[arg(short, long, env = "PILOT_CONFIG")]
        config: Option<String>,

        /// Results directory to read (overrides storage.output_dir)
        #[arg(short, long)]
        output: Option<String>,

        /// Skip final_report.md
        #[arg(long)]
        no_markdown: bool,
    },

    /// List the persona catalog
    Personas {
        /// Path to configuration file
        #[arg(short, long, env = "PILOT_CONFIG")]
        config: Option<String>,

        /// Only show personas of this digital maturity
        #[arg(long)]
        maturity: Option<DigitalMaturity>,
    },

    /// List the workshop stages
    Stages {
        /// Path to configuration file
        #[arg(short, long, env = "PILOT_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Options for `run`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, env = "PILOT_CONFIG")]
    pub config: Option<String>,

    /// Personas per group (overrides orchestrator.group_size)
    #[arg(short = 'k', long)]
    pub group_size: Option<usize>,

    /// Run at most this many personas
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Run only these persona ids (repeatable)
    #[arg(short, long = "persona")]
    pub personas: Vec<String>,

    /// Only run personas of this digital maturity
    #[arg(long)]
    pub maturity: Option<DigitalMaturity>,

    /// Results directory (overrides storage.output_dir)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Advisory backend (overrides advisory.provider)
    #[arg(short, long, value_enum)]
    pub backend: Option<AdvisoryProvider>,

    /// Also aggregate the results once the run finishes
    #[arg(long)]
    pub report: bool,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
