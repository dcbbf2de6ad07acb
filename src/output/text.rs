//! Human-readable text output

use crate::mesh::MeshPlan;
use crate::stats::aggregator::{GroupField, MeasurementSet, Order};
use std::path::Path;

/// Print the run summary to the console
///
/// Displays:
/// - Result totals (measured, skipped, failed)
/// - Lowest, highest and average latency
/// - Per-region rollup
/// - The fastest and slowest pairs
pub fn print_summary(set: &MeasurementSet, top_n: usize) {
    print!("{}", format_summary(set, top_n));
}

/// Summary text printed by [`print_summary`]
pub fn format_summary(set: &MeasurementSet, top_n: usize) -> String {
    let mut lines = Vec::new();
    let counts = set.counts();
    let meta = set.metadata();

    lines.push(rule());
    lines.push("                 LATENCY MESH RESULTS".to_string());
    lines.push(rule());
    lines.push(String::new());

    let elapsed = meta.finished_at - meta.started_at;
    lines.push(format!(
        "Elapsed Time: {:.3}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    ));
    lines.push(String::new());

    lines.push("Pairs:".to_string());
    lines.push(format!("  Measured: {}", format_number(counts.measurements)));
    if counts.skipped > 0 {
        lines.push(format!("  Skipped:  {} (same zone)", format_number(counts.skipped)));
    }
    lines.push(format!("  Failed:   {}", format_number(counts.failed)));
    lines.push(format!("  Total:    {}", format_number(counts.total())));
    lines.push(String::new());

    if let (Some(lowest), Some(highest), Some(overall)) = (set.lowest(), set.highest(), set.overall()) {
        lines.push("Latency (avg RTT):".to_string());
        lines.push(format!(
            "  Lowest:  {:.3} ms  {} -> {} ({})",
            lowest.avg_ms, lowest.source_id, lowest.target_id, lowest.region
        ));
        lines.push(format!(
            "  Highest: {:.3} ms  {} -> {} ({})",
            highest.avg_ms, highest.source_id, highest.target_id, highest.region
        ));
        lines.push(format!("  Average: {:.3} ms", overall.avg));
        lines.push(String::new());

        lines.push("Per Region:".to_string());
        for (key, stats) in set.group_by(&[GroupField::Cloud, GroupField::Region]) {
            lines.push(format!(
                "  {:<24} {:>4} pairs  min {:>8.3}  avg {:>8.3}  max {:>8.3}",
                key.join("/"),
                stats.count,
                stats.min,
                stats.avg,
                stats.max
            ));
        }
        lines.push(String::new());

        let shown = top_n.min(5);
        lines.push(format!("Fastest {} pairs:", shown));
        for m in set.top(shown, Order::Ascending) {
            lines.push(format!(
                "  {:>8.3} ms  {} -> {} ({})",
                m.avg_ms, m.source_id, m.target_id, m.region
            ));
        }
        lines.push(format!("Slowest {} pairs:", shown));
        for m in set.top(shown, Order::Descending) {
            lines.push(format!(
                "  {:>8.3} ms  {} -> {} ({})",
                m.avg_ms, m.source_id, m.target_id, m.region
            ));
        }
        lines.push(String::new());
    } else {
        lines.push("No successful measurements.".to_string());
        lines.push(String::new());
    }

    lines.push(rule());
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Print the pair plan (plan mode and dry runs)
pub fn print_plan(plan: &MeshPlan) {
    print!("{}", format_plan(plan));
}

/// Plan text printed by [`print_plan`]
pub fn format_plan(plan: &MeshPlan) -> String {
    let mut lines = vec!["Measurement plan:".to_string()];
    for (group, count) in plan.work_per_group() {
        lines.push(format!("  {:<24} {:>5} pairs", group.to_string(), count));
    }
    lines.push(format!("  Total: {} pairs", format_number(plan.work.len())));
    if !plan.same_zone.is_empty() {
        lines.push(format!("  Skipped (same zone): {}", plan.same_zone.len()));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Print where the run's files were written
pub fn print_output_files(dir: &Path, files: &[&str]) {
    println!("Results saved to: {}", dir.display());
    for file in files {
        println!("  {}", dir.join(file).display());
    }
}

fn rule() -> String {
    "═".repeat(59)
}

/// Format a number with thousands separators
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
