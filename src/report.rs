//! Operator-facing output.

use colored::*;
use std::io::Write;
use tracing::warn;

use crate::admission::Decision;
use crate::backup::BackupHandle;
use crate::error::UpdateResult;
use crate::executor::{ExecutionEvent, ExecutionSummary};
use crate::plan::{Plan, PlannedStatement};
use crate::statement::summarize;

/// Audit line for one statement's decision.
pub fn decision_line(statement: &PlannedStatement) -> String {
    let pos = format!("#{}", statement.position);
    let text = summarize(&statement.original);
    match &statement.decision {
        Decision::Admit if statement.flagged => format!(
            "  {} {} {} {} {}",
            "?".yellow(),
            pos.dimmed(),
            "admit".yellow(),
            text,
            "(unrecognized, review)".yellow()
        ),
        Decision::Admit if statement.overridden => format!(
            "  {} {} {} {} {}",
            "!".yellow().bold(),
            pos.dimmed(),
            "admit".yellow(),
            text,
            "(destructive, allowed by override)".yellow()
        ),
        Decision::Admit => format!("  {} {} {} {}", "✓".green(), pos.dimmed(), "admit".green(), text),
        Decision::Rewrite { sql } => format!(
            "  {} {} {} {} {}",
            "↻".yellow(),
            pos.dimmed(),
            "rewrite".yellow(),
            text,
            format!("(conditional form: {})", summarize(sql)).yellow()
        ),
        Decision::Reject { reason } => format!(
            "  {} {} {} {} {}",
            "✗".red(),
            pos.dimmed(),
            "reject".red(),
            text,
            format!("({})", reason).red()
        ),
    }
}

/// Print every decision, then the totals.
pub fn print_plan(plan: &Plan) {
    println!(
        "{} Extracted {} statement(s)",
        "📋".cyan(),
        plan.extracted_count().to_string().green()
    );
    for statement in &plan.statements {
        println!("{}", decision_line(statement));
    }
    for statement in plan.flagged() {
        warn!(
            position = statement.position,
            statement = %summarize(&statement.original),
            "statement kind not recognized, admitted for review"
        );
    }
    for statement in plan.overridden() {
        warn!(
            position = statement.position,
            statement = %summarize(&statement.original),
            "destructive statement admitted by override"
        );
    }
    println!(
        "\n  {} to apply, {} skipped",
        plan.admitted_count().to_string().green().bold(),
        plan.rejected().count().to_string().red()
    );
}

/// Numbered list of what will run.
pub fn print_preview(plan: &Plan) {
    println!("\n{}", "Statements to apply:".cyan().bold());
    for (i, statement) in plan.admitted().enumerate() {
        let sql = statement.sql().unwrap_or_default();
        println!("  {:>3}. {}", i + 1, summarize(sql));
    }
    println!();
}

pub fn print_up_to_date() {
    println!("{} Schema is up to date, nothing to apply.", "✓".green());
}

pub fn print_dry_run() {
    println!("{}", "Dry run, no changes made.".yellow());
}

pub fn print_database_created(name: &str) {
    println!("{} Created database {}", "🆕".cyan(), name.cyan());
}

pub fn print_backup(handle: &BackupHandle) {
    println!(
        "{} Backup written to {}",
        "📦".cyan(),
        handle.path.display().to_string().dimmed()
    );
}

/// Progress line for one execution step.
pub fn print_event(event: ExecutionEvent<'_>) {
    match event {
        ExecutionEvent::Started(statement) => {
            print!(
                "  {} #{} {}... ",
                "→".dimmed(),
                statement.position,
                summarize(statement.sql().unwrap_or_default())
            );
            std::io::stdout().flush().ok();
        }
        ExecutionEvent::Applied(_) => println!("{}", "✓".green()),
        ExecutionEvent::Failed(_, message) => println!("{} {}", "✗".red(), message.red()),
    }
}

pub fn print_summary(summary: &ExecutionSummary, backup: Option<&BackupHandle>) {
    println!();
    println!(
        "{} Applied {} statement(s)",
        "✅".green(),
        summary.applied.len().to_string().green()
    );
    if let Some(handle) = backup {
        println!("   backup: {}", handle.path.display().to_string().dimmed());
    }
}

/// The plan as pretty JSON.
pub fn plan_json(plan: &Plan) -> UpdateResult<String> {
    serde_json::to_string_pretty(plan).map_err(|e| std::io::Error::from(e).into())
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(question: &str) -> bool {
    print!("{} {} ", question, "(y/N)".dimmed());
    std::io::stdout().flush().ok();

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
