//! Output formatting module
//!
//! This module handles formatting validation reports and simulation runs for
//! different output formats.

use crate::Result;
use crate::state_machine::{GraphStats, IssueLevel, ValidationIssue};
use serde::Serialize;
use serde_json::json;

/// One simulated step and where it left the session
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub from: String,
    pub to: String,
    /// Why the gate refused the step, if it did
    pub rejected: Option<String>,
}

/// Output a validation report as JSON
pub fn issues_json(
    w: &mut impl std::io::Write,
    valid: bool,
    issues: &[ValidationIssue],
    stats: Option<&GraphStats>,
) -> Result<()> {
    let output = json!({
        "valid": valid,
        "summary": {
            "errors": count(issues, IssueLevel::Error),
            "warnings": count(issues, IssueLevel::Warning),
        },
        "issues": issues,
        "stats": stats,
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?; // Add trailing newline
    Ok(())
}

/// Output a validation report as text table
pub fn issues_table(
    w: &mut impl std::io::Write,
    valid: bool,
    issues: &[ValidationIssue],
    stats: Option<&GraphStats>,
) -> Result<()> {
    writeln!(w, "State Gate - Validation Report")?;
    writeln!(w, "{}", "=".repeat(80))?;
    writeln!(w)?;

    writeln!(w, "Summary:")?;
    writeln!(w, "  Valid:     {}", if valid { "yes" } else { "no" })?;
    writeln!(w, "  Errors:    {}", count(issues, IssueLevel::Error))?;
    writeln!(w, "  Warnings:  {}", count(issues, IssueLevel::Warning))?;
    writeln!(w)?;

    if let Some(stats) = stats {
        writeln!(w, "Graph:")?;
        writeln!(w, "  States:          {}", stats.total_states)?;
        writeln!(w, "  Edges:           {}", stats.total_edges)?;
        writeln!(w, "  Self-loops:      {}", stats.self_loops)?;
        writeln!(w, "  Terminal edges:  {}", stats.terminal_edges)?;
        writeln!(w, "  Cyclic:          {}", stats.has_cycles)?;
        writeln!(w)?;
    }

    if !issues.is_empty() {
        writeln!(w, "Issues:")?;
        writeln!(w, "{:-<80}", "")?;
        writeln!(w, "{:<8} {:<71}", "Level", "Message")?;
        writeln!(w, "{:-<80}", "")?;

        for issue in issues {
            let level = match issue.level {
                IssueLevel::Error => "error",
                IssueLevel::Warning => "warning",
            };
            writeln!(w, "{:<8} {:<71}", level, issue.message)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

/// Output a simulation run as JSON
pub fn simulation_json(
    w: &mut impl std::io::Write,
    session: Option<&str>,
    records: &[StepRecord],
) -> Result<()> {
    let output = json!({
        "session": session,
        "final_state": records.last().map(|r| r.to.as_str()),
        "steps": records,
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?;
    Ok(())
}

/// Output a simulation run as text table
pub fn simulation_table(
    w: &mut impl std::io::Write,
    session: Option<&str>,
    records: &[StepRecord],
) -> Result<()> {
    writeln!(w, "State Gate - Simulation ({})", session.unwrap_or("global"))?;
    writeln!(w, "{:-<80}", "")?;
    writeln!(w, "{:<36} {:<16} {:<16} {:<10}", "Step", "From", "To", "Result")?;
    writeln!(w, "{:-<80}", "")?;

    for record in records {
        let step = if record.step.chars().count() > 34 {
            format!("{}...", record.step.chars().take(31).collect::<String>())
        } else {
            record.step.clone()
        };
        let result = if record.rejected.is_some() {
            "rejected"
        } else {
            "applied"
        };
        writeln!(
            w,
            "{:<36} {:<16} {:<16} {:<10}",
            step, record.from, record.to, result
        )?;
    }

    for (i, record) in records.iter().enumerate() {
        if let Some(reason) = &record.rejected {
            writeln!(w, "  step {}: {}", i + 1, reason)?;
        }
    }

    Ok(())
}

fn count(issues: &[ValidationIssue], level: IssueLevel) -> usize {
    issues.iter().filter(|i| i.level == level).count()
}
