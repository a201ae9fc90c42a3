//! Report rendering

use anyhow::Result;
use console::style;
use serde_json::json;
use stratoswarm_tilt_optimizer::{PanelLayout, RunReport, TerminationReason};

use crate::cli::OutputFormat;

/// First block of a run id
fn short_id(id: impl std::fmt::Display) -> String {
    id.to_string().chars().take(8).collect()
}

pub fn print_report(report: &RunReport, layout: &PanelLayout, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Table => print_report_table(report, layout),
    }
    Ok(())
}

fn print_report_table(report: &RunReport, layout: &PanelLayout) {
    let termination = match report.termination {
        TerminationReason::Converged => style(report.termination.to_string()).green(),
        TerminationReason::StepBudgetExhausted => style(report.termination.to_string()).yellow(),
    };

    println!();
    println!("{}", style("Tilt Optimization").cyan().bold());
    println!("{}", style("=".repeat(40)).dim());
    println!();
    println!("Run:          {}", style(short_id(report.run_id)).dim());
    println!("Algorithm:    {}", report.algorithm);
    println!("Objective:    {}", report.objective);
    println!("Result:       {}", termination);
    println!(
        "Steps:        {} ({} evaluations)",
        report.outer_steps, report.evaluations
    );
    println!(
        "Best yield:   {}",
        style(format!("{:.3}", report.best_fitness)).bold()
    );
    println!(
        "Duration:     {} ms",
        (report.finished_at - report.started_at).num_milliseconds()
    );

    println!();
    println!(
        "{:12} {:>10} {:>10}",
        style("ROW").bold().underlined(),
        style("TILT").bold().underlined(),
        style("GENE").bold().underlined()
    );
    for ((row, angle), gene) in layout
        .rows()
        .iter()
        .zip(&report.best_angles)
        .zip(&report.best_position)
    {
        println!(
            "{:12} {:>9.1}° {:>10.3}",
            row.label,
            angle.to_degrees(),
            gene
        );
    }

    if report.history.len() > 1 {
        println!();
        println!(
            "{:>6} {:>12} {:>12} {:>12}",
            style("STEP").bold().underlined(),
            style("MEAN").bold().underlined(),
            style("STEP BEST").bold().underlined(),
            style("GLOBAL BEST").bold().underlined()
        );
        for record in report.history.records().iter().skip(1) {
            let marker = if record.partial { "*" } else { "" };
            println!(
                "{:>6} {:>12} {:>12} {:>12}",
                format!("{}{}", record.step, marker),
                format_fitness(record.average_fitness),
                format_fitness(record.best_fitness_of_step),
                format_fitness(record.global_best_fitness)
            );
        }
    }
    println!();
}

fn format_fitness(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

pub fn print_aborted(
    run_id: impl std::fmt::Display,
    evaluations: u64,
    layout: &PanelLayout,
    format: OutputFormat,
) -> Result<()> {
    let tilts: Vec<f64> = layout.rows().iter().map(|row| row.tilt).collect();
    match format {
        OutputFormat::Json => {
            let value = json!({
                "run_id": run_id.to_string(),
                "aborted": true,
                "evaluations": evaluations,
                "restored_tilts": tilts,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            println!();
            println!(
                "{} run {} after {} evaluations; layout restored",
                style("Aborted").red().bold(),
                short_id(run_id),
                evaluations
            );
            println!();
        }
    }
    Ok(())
}
