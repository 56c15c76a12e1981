use anyhow::Result;
use colored::Colorize;
use std::io::Write;

use dicesim_engine::SimulationReport;

const BAR_WIDTH: usize = 40;

fn seed_label(report: &SimulationReport) -> String {
    report
        .seed
        .map_or_else(|| "entropy".to_string(), |seed| seed.to_string())
}

fn marker_labels(report: &SimulationReport) -> Vec<String> {
    report
        .statistics
        .quartiles
        .iter()
        .zip(1_u32..)
        .map(|(outcome, step)| format!("{}%: {outcome}", report.quartile_step * f64::from(step)))
        .collect()
}

fn bar(percent: f64, max_percent: f64) -> String {
    if max_percent <= 0.0 {
        return String::new();
    }
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let len = ((percent / max_percent) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len.min(BAR_WIDTH))
}

pub fn generate_console_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    writeln!(out, "{}", format!("🎲 {}", report.title).bright_cyan().bold())?;
    writeln!(out, "{}", "=".repeat(report.title.chars().count() + 3).cyan())?;
    writeln!(out, "Pool: {}", report.description)?;
    writeln!(out, "Trials: {}", report.num_trials)?;
    writeln!(
        out,
        "Margin of error: ±{} at {} confidence",
        report.margin_label, report.confidence_level
    )?;
    writeln!(out, "Seed: {}", seed_label(report))?;
    writeln!(out, "RNG draws: {}", report.draws)?;
    writeln!(out)?;

    writeln!(out, "{}", "📈 Distribution".bright_yellow().bold())?;
    writeln!(out, "{}", "---------------".yellow())?;
    let max_percent = report
        .distribution
        .iter()
        .map(|(_, percent)| percent)
        .fold(0.0_f64, f64::max);
    for (outcome, percent) in report.distribution.iter() {
        writeln!(
            out,
            "{outcome:>6} {percent:>9.4}% {}",
            bar(percent, max_percent).green()
        )?;
    }
    let pruned = report.distribution.pruned();
    if pruned > 0 {
        writeln!(
            out,
            "{}",
            format!("   ({pruned} rare outcomes pruned)").dimmed()
        )?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "📊 Statistics".bright_yellow().bold())?;
    writeln!(out, "{}", "-------------".yellow())?;
    writeln!(out, "Mean: {}", report.statistics.mean)?;
    writeln!(out, "Standard deviation: {}", report.statistics.std_dev)?;
    let markers = marker_labels(report);
    if markers.is_empty() {
        writeln!(out, "Quartile markers: none")?;
    } else {
        writeln!(out, "Quartile markers: {}", markers.join(", "))?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    let json_output = serde_json::to_string_pretty(report)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    writeln!(out, "# {}\n", report.title)?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Pool**: {}", report.description)?;
    writeln!(out, "- **Trials**: {}", report.num_trials)?;
    writeln!(out, "- **Confidence level**: {}", report.confidence_level)?;
    writeln!(out, "- **Margin of error**: {}", report.margin_label)?;
    writeln!(out, "- **Seed**: {}", seed_label(report))?;
    writeln!(out, "- **Mean**: {}", report.statistics.mean)?;
    writeln!(out, "- **Standard deviation**: {}", report.statistics.std_dev)?;
    let markers = marker_labels(report);
    if !markers.is_empty() {
        writeln!(out, "- **Quartile markers**: {}", markers.join(", "))?;
    }
    writeln!(out)?;

    writeln!(out, "## Distribution\n")?;
    writeln!(out, "| Outcome | Count | Percent |")?;
    writeln!(out, "|---:|---:|---:|")?;
    for (outcome, percent) in report.distribution.iter() {
        writeln!(
            out,
            "| {outcome} | {} | {percent} |",
            report.counts.get(outcome)
        )?;
    }
    Ok(())
}

pub fn generate_csv_report(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    writeln!(out, "outcome,count,percent")?;
    for (outcome, percent) in report.distribution.iter() {
        writeln!(out, "{outcome},{},{percent}", report.counts.get(outcome))?;
    }
    Ok(())
}
