//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::state_machine::{Kind, Outcome};
use crate::{Config, Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub mod commands;
pub mod output;

/// Operation gate automaton toolkit
#[derive(Parser, Debug)]
#[command(name = "state-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "STATE_GATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (overrides config; RUST_LOG overrides both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a definition and report validation issues
    Check {
        /// Path to definition file (defaults to config)
        definition: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Export the built automaton to Graphviz DOT
    Graph {
        /// Path to definition file (defaults to config)
        definition: Option<PathBuf>,

        /// Write to a timestamped file in the export directory instead of stdout
        #[arg(long)]
        export: bool,

        /// Layout direction (overrides config)
        #[arg(long)]
        rankdir: Option<String>,
    },

    /// Drive a sequence of outcomes through the gate
    Simulate {
        /// Path to definition file (defaults to config)
        #[arg(short, long)]
        definition: Option<PathBuf>,

        /// Session to run the steps under
        #[arg(short, long)]
        session: Option<String>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Steps such as `action:login=ok` or `item:docs://intro=err`
        #[arg(required = true)]
        steps: Vec<Step>,
    },
}

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text table
    Table,
}

/// One simulated invocation: `kind:ident=ok|err`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: Kind,
    pub ident: String,
    pub outcome: Outcome,
}

impl FromStr for Step {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::custom(format!("invalid step '{s}', expected kind:ident=ok|err"));

        let (kind, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (ident, outcome) = rest.rsplit_once('=').ok_or_else(invalid)?;
        if ident.is_empty() {
            return Err(invalid());
        }
        let outcome = match outcome {
            "ok" | "success" => Outcome::Success,
            "err" | "error" => Outcome::Error,
            _ => return Err(invalid()),
        };

        Ok(Step {
            kind: kind.parse()?,
            ident: ident.to_string(),
            outcome,
        })
    }
}

/// Execute the CLI command
pub async fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Check { definition, format } => {
            commands::check::execute(&config, definition, format)
        }
        Commands::Graph {
            definition,
            export,
            rankdir,
        } => commands::graph::execute(&config, definition, export, rankdir),
        Commands::Simulate {
            definition,
            session,
            format,
            steps,
        } => commands::simulate::execute(&config, definition, session, format, steps).await,
    }
}
