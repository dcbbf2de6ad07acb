//! Markdown report
//!
//! Renders a [`MeasurementSet`] as `report.md`:
//!
//! - Summary: totals, coverage, extremes and the pooled average
//! - Per-region tables, fastest pair first
//! - Top-N lowest and highest latency pairs
//! - Per-region rollup (pairs, min, avg, max)
//! - Failures, when any
//! - Methodology
//!
//! All latencies are the per-pair average round-trip time in milliseconds.

use crate::stats::aggregator::{GroupField, MeasurementSet, Order};
use crate::stats::Measurement;
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Report file written into the output directory
pub const REPORT_FILE: &str = "report.md";

/// Render the report
pub fn render_report(set: &MeasurementSet, top_n: usize) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report_body(&mut out, set, top_n);
    out
}

/// Render the report and write it to `path`
pub fn write_report(path: &Path, set: &MeasurementSet, top_n: usize) -> Result<()> {
    fs::write(path, render_report(set, top_n))
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

fn write_report_body(out: &mut String, set: &MeasurementSet, top_n: usize) -> std::fmt::Result {
    let meta = set.metadata();
    let counts = set.counts();

    writeln!(out, "# Availability Zone Latency Report")?;
    writeln!(out)?;
    writeln!(out, "Generated: {}", meta.finished_at.to_rfc3339())?;
    writeln!(out)?;

    // Summary
    writeln!(out, "## Summary")?;
    writeln!(out)?;
    let region_count: usize = meta.regions.values().map(Vec::len).sum();
    writeln!(out, "- Total measurements: {}", counts.measurements)?;
    writeln!(out, "- Skipped (same zone): {}", counts.skipped)?;
    writeln!(out, "- Errors: {}", counts.failed)?;
    writeln!(out, "- Clouds covered: {}", meta.clouds.join(", "))?;
    writeln!(out, "- Regions covered: {}", region_count)?;
    writeln!(out, "- Ping count per measurement: {}", meta.sample_count)?;
    writeln!(out)?;

    let (Some(lowest), Some(highest), Some(overall)) = (set.lowest(), set.highest(), set.overall())
    else {
        writeln!(out, "No measurement results found.")?;
        write_failures(out, set)?;
        return write_methodology(out, set);
    };

    writeln!(out, "**Key findings:**")?;
    writeln!(out)?;
    writeln!(out, "- Lowest latency: {}", describe(lowest))?;
    writeln!(out, "- Highest latency: {}", describe(highest))?;
    writeln!(out, "- Average latency across all zone pairs: {:.3} ms", overall.avg)?;
    writeln!(out)?;

    // Detail per region
    writeln!(out, "## Detailed Results by Region")?;
    writeln!(out)?;
    let mut by_region: BTreeMap<(&str, &str), Vec<&Measurement>> = BTreeMap::new();
    for m in set.sorted_by_latency() {
        by_region
            .entry((m.cloud.as_str(), m.region.as_str()))
            .or_default()
            .push(m);
    }
    for ((cloud, region), rows) in &by_region {
        writeln!(out, "### {} ({})", region, cloud)?;
        writeln!(out)?;
        writeln!(out, "| Source AZ | Target AZ | Min (ms) | Avg (ms) | Max (ms) | StdDev |")?;
        writeln!(out, "|---|---|---:|---:|---:|---:|")?;
        for m in rows {
            writeln!(
                out,
                "| {} | {} | {:.3} | {:.3} | {:.3} | {:.3} |",
                m.source_id, m.target_id, m.min_ms, m.avg_ms, m.max_ms, m.spread_ms
            )?;
        }
        writeln!(out)?;
    }

    // Extremes
    writeln!(out, "## Summary Statistics")?;
    writeln!(out)?;
    writeln!(out, "### Top {} Lowest Latency AZ Pairs", top_n)?;
    writeln!(out)?;
    write_ranking(out, &set.top(top_n, Order::Ascending))?;
    writeln!(out, "### Top {} Highest Latency AZ Pairs", top_n)?;
    writeln!(out)?;
    write_ranking(out, &set.top(top_n, Order::Descending))?;

    // Rollup
    writeln!(out, "### Per-Region Latency Summary")?;
    writeln!(out)?;
    writeln!(out, "| Cloud | Region | AZ Pairs | Min (ms) | Avg (ms) | Max (ms) |")?;
    writeln!(out, "|---|---|---:|---:|---:|---:|")?;
    for (key, stats) in set.group_by(&[GroupField::Cloud, GroupField::Region]) {
        writeln!(
            out,
            "| {} | {} | {} | {:.3} | {:.3} | {:.3} |",
            key[0], key[1], stats.count, stats.min, stats.avg, stats.max
        )?;
    }
    writeln!(out)?;

    write_failures(out, set)?;
    write_methodology(out, set)
}

fn describe(m: &Measurement) -> String {
    format!(
        "{} -> {} ({}) = {:.3} ms",
        m.source_id, m.target_id, m.region, m.avg_ms
    )
}

fn write_ranking(out: &mut String, rows: &[&Measurement]) -> std::fmt::Result {
    writeln!(out, "| Region | Source AZ | Target AZ | Avg (ms) |")?;
    writeln!(out, "|---|---|---|---:|")?;
    for m in rows {
        writeln!(
            out,
            "| {} | {} | {} | {:.3} |",
            m.region, m.source_id, m.target_id, m.avg_ms
        )?;
    }
    writeln!(out)
}

fn write_failures(out: &mut String, set: &MeasurementSet) -> std::fmt::Result {
    let failures: Vec<_> = set.failures().collect();
    if failures.is_empty() {
        return Ok(());
    }

    writeln!(out, "## Failures")?;
    writeln!(out)?;
    writeln!(out, "| Region | Source AZ | Target AZ | Cause | Detail |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for f in failures {
        let detail = f.detail.as_deref().unwrap_or("").replace('|', "\\|");
        writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            f.region, f.source_id, f.target_id, f.cause, detail
        )?;
    }
    writeln!(out)
}

fn write_methodology(out: &mut String, set: &MeasurementSet) -> std::fmt::Result {
    let meta = set.metadata();
    writeln!(out, "## Methodology")?;
    writeln!(out)?;
    writeln!(
        out,
        "- Tool: ICMP ping ({}) with {} packets per measurement",
        if meta.probe.is_empty() { "n/a" } else { meta.probe.as_str() },
        meta.sample_count
    )?;
    writeln!(out, "- Metric: round-trip time (RTT) in milliseconds")?;
    writeln!(out, "- Statistics: min/avg/max/stddev per zone pair")?;
    writeln!(out, "- One instance per availability zone; measurements use private IPs within a region")?;
    writeln!(out, "- Pair mode: {}", meta.mode)?;
    writeln!(
        out,
        "- Time budget per pair: {:.1}s, up to {} concurrent probes per region",
        meta.time_budget_ms as f64 / 1000.0,
        meta.max_parallel
    )?;
    if let Some(ref host) = meta.runner_host {
        writeln!(out, "- Runner: {}", host)?;
    }
    Ok(())
}
