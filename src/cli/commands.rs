//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::definition::AutomatonDefinition;
use crate::registry::Registries;
use crate::state_machine::Automaton;
use crate::{Config, Result};
use std::path::PathBuf;

/// Load a definition and build its automaton together with its registries
fn load(config: &Config, definition: Option<PathBuf>) -> Result<(Automaton, Registries)> {
    let path = config.definition_path(definition)?;
    tracing::info!("Loading definition: {:?}", path);

    let def = AutomatonDefinition::from_file(&path)?;
    let registries = def.registries()?;
    let machine = def.definition(registries.clone()).build()?;
    tracing::info!(
        "Built automaton with {} states, {} edges and {} symbols",
        machine.states().count(),
        machine.edges().len(),
        machine.symbols().count()
    );
    Ok((machine, registries))
}

pub mod check {
    use super::*;
    use crate::Error;
    use crate::cli::{OutputFormat, output};

    /// Execute the check command
    pub fn execute(
        config: &Config,
        definition: Option<PathBuf>,
        format: Option<OutputFormat>,
    ) -> Result<()> {
        let format = format.unwrap_or(config.default.format);
        let mut stdout = std::io::stdout();

        match load(config, definition) {
            Ok((machine, _)) => {
                let stats = machine.graph().stats();
                match format {
                    OutputFormat::Json => {
                        output::issues_json(&mut stdout, true, machine.issues(), Some(&stats))?
                    }
                    OutputFormat::Table => {
                        output::issues_table(&mut stdout, true, machine.issues(), Some(&stats))?
                    }
                }
                Ok(())
            }
            Err(Error::Build { messages, issues }) => {
                match format {
                    OutputFormat::Json => output::issues_json(&mut stdout, false, &issues, None)?,
                    OutputFormat::Table => {
                        output::issues_table(&mut stdout, false, &issues, None)?
                    }
                }
                Err(Error::Build { messages, issues })
            }
            Err(e) => Err(e),
        }
    }
}

pub mod graph {
    use super::*;
    use std::io::Write;

    /// Execute the graph command
    pub fn execute(
        config: &Config,
        definition: Option<PathBuf>,
        export: bool,
        rankdir: Option<String>,
    ) -> Result<()> {
        let (machine, _) = load(config, definition)?;
        let rankdir = rankdir.unwrap_or_else(|| config.graph.rankdir.clone());
        let dot = machine
            .graph()
            .to_dot(&rankdir, Some(machine.initial_state()));

        if !export {
            print!("{}", dot);
            return Ok(());
        }

        let dir = config.export_directory();
        std::fs::create_dir_all(&dir)?;
        let filename = dir.join(format!(
            "{}.graph.dot",
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ));
        let mut file = std::fs::File::create(&filename)?;
        file.write_all(dot.as_bytes())?;

        tracing::info!("Graph exported to {:?}", filename);
        println!("Graph exported to {}", filename.display());
        Ok(())
    }
}

pub mod simulate {
    use super::*;
    use crate::cli::output::{self, StepRecord};
    use crate::cli::{OutputFormat, Step};
    use crate::gate::Gate;
    use crate::state_machine::Outcome;
    use serde_json::Value;
    use std::sync::Arc;

    /// Execute the simulate command
    pub async fn execute(
        config: &Config,
        definition: Option<PathBuf>,
        session: Option<String>,
        format: Option<OutputFormat>,
        steps: Vec<Step>,
    ) -> Result<()> {
        let (machine, registries) = load(config, definition)?;
        let gate = Gate::new(Arc::new(machine), registries);
        let records = run(&gate, session.clone(), &steps).await;

        let mut stdout = std::io::stdout();
        let session = session.as_deref();
        match format.unwrap_or(config.default.format) {
            OutputFormat::Json => output::simulation_json(&mut stdout, session, &records),
            OutputFormat::Table => output::simulation_table(&mut stdout, session, &records),
        }
    }

    /// Feed every step through the gate; rejected steps are recorded and skipped
    pub async fn run(gate: &Gate, session: Option<String>, steps: &[Step]) -> Vec<StepRecord> {
        let mut records = Vec::with_capacity(steps.len());
        for step in steps {
            let from = gate.current_state(session.as_deref());
            let outcome = step.outcome;
            let result = gate
                .invoke_with(step.kind, &step.ident, session.clone(), async move {
                    match outcome {
                        Outcome::Success => Ok(Value::Null),
                        Outcome::Error => Err(anyhow::anyhow!("simulated failure")),
                    }
                })
                .await;

            let rejected = match result {
                Ok(_) => None,
                Err(e) if e.is_operation() => None,
                Err(e) => {
                    tracing::warn!("Step {}:{} rejected: {}", step.kind, step.ident, e);
                    Some(e.to_string())
                }
            };

            records.push(StepRecord {
                step: format!("{}:{}={}", step.kind, step.ident, step.outcome),
                from,
                to: gate.current_state(session.as_deref()),
                rejected,
            });
        }
        records
    }

}
