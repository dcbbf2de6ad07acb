//! Result aggregation
//!
//! Collects the per-pair results of a run into a [`MeasurementSet`] and derives
//! read-only views from it:
//!
//! - **Latency ranking**: measurements sorted by average latency
//! - **Extremes**: top-N lowest or highest
//! - **Rollups**: count/min/avg/max per cloud, region or both
//! - **Totals**: measurements, skips and failures
//!
//! Only `Measurement` results take part in latency statistics; skips and
//! failures are counted in the totals. Every rollup is a true pooled mean over
//! the member measurements, never an average of per-group averages.
//!
//! # Example
//!
//! ```
//! use latmesh::stats::aggregator::{aggregate, Order, RunMetadata};
//!
//! let set = aggregate(Vec::new(), RunMetadata::default());
//! assert_eq!(set.counts().measurements, 0);
//! assert!(set.top(10, Order::Ascending).is_empty());
//! ```

use super::{Failure, Measurement, MeasurementResult};
use crate::mesh::SymmetryMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Result totals by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub measurements: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.measurements + self.skipped + self.failed
    }

    fn tally(results: &[MeasurementResult]) -> Self {
        let mut counts = Counts::default();
        for result in results {
            match result {
                MeasurementResult::Measurement(_) => counts.measurements += 1,
                MeasurementResult::Skipped(_) => counts.skipped += 1,
                MeasurementResult::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }
}

/// Run-level metadata exported with the results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Name of the probe implementation
    pub probe: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_host: Option<String>,
    pub mode: SymmetryMode,
    /// Requested samples per pair
    pub sample_count: u32,
    pub time_budget_ms: u64,
    pub max_parallel: usize,
    #[serde(default)]
    pub totals: Counts,
    /// Clouds present in the run
    #[serde(default)]
    pub clouds: Vec<String>,
    /// Regions present per cloud
    #[serde(default)]
    pub regions: BTreeMap<String, Vec<String>>,
}

impl Default for RunMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            probe: String::new(),
            runner_host: None,
            mode: SymmetryMode::default(),
            sample_count: 0,
            time_budget_ms: 0,
            max_parallel: 0,
            totals: Counts::default(),
            clouds: Vec::new(),
            regions: BTreeMap::new(),
        }
    }
}

/// Ranking direction for [`MeasurementSet::top`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Lowest latency first
    Ascending,
    /// Highest latency first
    Descending,
}

/// Grouping dimension for [`MeasurementSet::group_by`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Cloud,
    Region,
}

/// Rollup over a group of measurements (latency = per-pair average)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    fn finish(&self) -> Option<GroupStats> {
        if self.count == 0 {
            return None;
        }
        let avg = (self.sum / self.count as f64).clamp(self.min, self.max);
        Some(GroupStats {
            count: self.count,
            min: self.min,
            avg,
            max: self.max,
        })
    }
}

/// Ascending latency, ties broken by (cloud, region, source, target)
fn compare_latency(a: &Measurement, b: &Measurement) -> Ordering {
    a.avg_ms
        .total_cmp(&b.avg_ms)
        .then_with(|| tie_break(a, b))
}

fn tie_break(a: &Measurement, b: &Measurement) -> Ordering {
    (&a.cloud, &a.region, &a.source_id, &a.target_id)
        .cmp(&(&b.cloud, &b.region, &b.source_id, &b.target_id))
}

/// Immutable result set of one run
///
/// Built once from the complete result sequence. The latency ordering is
/// computed on first use and cached; the results themselves are never touched.
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementSet {
    metadata: RunMetadata,
    results: Vec<MeasurementResult>,
    #[serde(skip)]
    sorted: OnceLock<Vec<usize>>,
}

/// Build a set from a complete result sequence
pub fn aggregate(results: Vec<MeasurementResult>, metadata: RunMetadata) -> MeasurementSet {
    MeasurementSet::from_results(results, metadata)
}

impl MeasurementSet {
    /// Build a set, recomputing totals (and group keys when absent)
    pub fn from_results(results: Vec<MeasurementResult>, mut metadata: RunMetadata) -> Self {
        metadata.totals = Counts::tally(&results);

        if metadata.clouds.is_empty() && metadata.regions.is_empty() {
            for result in &results {
                let regions = metadata.regions.entry(result.cloud().to_string()).or_default();
                if !regions.iter().any(|r| r == result.region()) {
                    regions.push(result.region().to_string());
                }
            }
            for regions in metadata.regions.values_mut() {
                regions.sort();
            }
            metadata.clouds = metadata.regions.keys().cloned().collect();
        }

        Self {
            metadata,
            results,
            sorted: OnceLock::new(),
        }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// All results, in collection order
    pub fn results(&self) -> &[MeasurementResult] {
        &self.results
    }

    pub fn into_parts(self) -> (RunMetadata, Vec<MeasurementResult>) {
        (self.metadata, self.results)
    }

    pub fn counts(&self) -> Counts {
        self.metadata.totals
    }

    /// Measurement results, in collection order
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.results.iter().filter_map(MeasurementResult::as_measurement)
    }

    /// Failed results, in collection order
    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.results.iter().filter_map(MeasurementResult::as_failure)
    }

    fn sorted_indices(&self) -> &[usize] {
        self.sorted.get_or_init(|| {
            let mut indices: Vec<usize> = self
                .results
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_measurement())
                .map(|(i, _)| i)
                .collect();
            indices.sort_by(|&a, &b| {
                match (self.results[a].as_measurement(), self.results[b].as_measurement()) {
                    (Some(ma), Some(mb)) => compare_latency(ma, mb),
                    _ => Ordering::Equal,
                }
            });
            indices
        })
    }

    /// Measurements ordered by ascending average latency
    pub fn sorted_by_latency(&self) -> Vec<&Measurement> {
        self.sorted_indices()
            .iter()
            .filter_map(|&i| self.results[i].as_measurement())
            .collect()
    }

    /// First `n` measurements by latency
    ///
    /// Equal latencies are ordered by (cloud, region, source, target) in both
    /// directions.
    pub fn top(&self, n: usize, order: Order) -> Vec<&Measurement> {
        let mut ranked = self.sorted_by_latency();
        if order == Order::Descending {
            ranked.sort_by(|a, b| b.avg_ms.total_cmp(&a.avg_ms).then_with(|| tie_break(a, b)));
        }
        ranked.truncate(n);
        ranked
    }

    /// Lowest-latency measurement
    pub fn lowest(&self) -> Option<&Measurement> {
        self.sorted_by_latency().first().copied()
    }

    /// Highest-latency measurement
    pub fn highest(&self) -> Option<&Measurement> {
        self.top(1, Order::Descending).first().copied()
    }

    /// Rollups keyed by the requested fields, in field order
    ///
    /// Groups without measurements are absent. An empty field list pools every
    /// measurement under the empty key.
    pub fn group_by(&self, fields: &[GroupField]) -> BTreeMap<Vec<String>, GroupStats> {
        let mut groups: BTreeMap<Vec<String>, Accumulator> = BTreeMap::new();

        for m in self.measurements() {
            let key = fields
                .iter()
                .map(|field| match field {
                    GroupField::Cloud => m.cloud.clone(),
                    GroupField::Region => m.region.clone(),
                })
                .collect();
            groups.entry(key).or_default().add(m.avg_ms);
        }

        groups
            .into_iter()
            .filter_map(|(key, acc)| acc.finish().map(|stats| (key, stats)))
            .collect()
    }

    /// Pooled rollup over every measurement
    pub fn overall(&self) -> Option<GroupStats> {
        self.group_by(&[]).into_values().next()
    }
}
