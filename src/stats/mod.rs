//! Measurement records and sample statistics
//!
//! Every generated pair produces exactly one [`MeasurementResult`]:
//!
//! - **Measurement**: latency statistics for a successful probe
//! - **Skipped**: pair excluded by policy (both ends in the same zone)
//! - **Failed**: timeout, unparseable output or transport failure
//!
//! Records are created once by the executor (or the coordinator for skips) and
//! never modified afterwards. [`aggregator::MeasurementSet`] collects them and
//! derives rankings and rollups.

pub mod aggregator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latency statistics for one successful pair measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub cloud: String,
    pub region: String,
    pub source_id: String,
    pub target_id: String,
    pub source_address: String,
    pub target_address: String,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Standard deviation of samples, or the tool-reported deviation
    pub spread_ms: f64,
    pub sample_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_loss_pct: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Why a pair was not measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Source and target report the same availability zone
    SameZone,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SameZone => write!(f, "same_zone"),
        }
    }
}

/// Pair excluded from measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skipped {
    pub cloud: String,
    pub region: String,
    pub source_id: String,
    pub target_id: String,
    pub reason: SkipReason,
}

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Probe exceeded its time budget
    Timeout,
    /// Probe completed but yielded no usable sample
    ParseError,
    /// Any other failure reaching or executing on a node
    TransportError,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Timeout => write!(f, "timeout"),
            FailureCause::ParseError => write!(f, "parse_error"),
            FailureCause::TransportError => write!(f, "transport_error"),
        }
    }
}

/// Pair whose measurement failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub cloud: String,
    pub region: String,
    pub source_id: String,
    pub target_id: String,
    pub cause: FailureCause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Bounded prefix of the raw probe output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

/// Outcome for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeasurementResult {
    Measurement(Measurement),
    Skipped(Skipped),
    Failed(Failure),
}

impl MeasurementResult {
    pub fn cloud(&self) -> &str {
        match self {
            MeasurementResult::Measurement(m) => &m.cloud,
            MeasurementResult::Skipped(s) => &s.cloud,
            MeasurementResult::Failed(f) => &f.cloud,
        }
    }

    pub fn region(&self) -> &str {
        match self {
            MeasurementResult::Measurement(m) => &m.region,
            MeasurementResult::Skipped(s) => &s.region,
            MeasurementResult::Failed(f) => &f.region,
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            MeasurementResult::Measurement(m) => &m.source_id,
            MeasurementResult::Skipped(s) => &s.source_id,
            MeasurementResult::Failed(f) => &f.source_id,
        }
    }

    pub fn target_id(&self) -> &str {
        match self {
            MeasurementResult::Measurement(m) => &m.target_id,
            MeasurementResult::Skipped(s) => &s.target_id,
            MeasurementResult::Failed(f) => &f.target_id,
        }
    }

    pub fn as_measurement(&self) -> Option<&Measurement> {
        match self {
            MeasurementResult::Measurement(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            MeasurementResult::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_measurement(&self) -> bool {
        matches!(self, MeasurementResult::Measurement(_))
    }
}

/// min/avg/max/spread over a set of latency samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    /// Population standard deviation (0 for a single sample)
    pub stddev: f64,
    pub count: usize,
}

impl SampleSummary {
    /// Summarize samples; `None` when empty
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &s in samples {
            min = min.min(s);
            max = max.max(s);
            sum += s;
        }
        let avg = sum / count as f64;

        let stddev = if count >= 2 {
            let variance = samples.iter().map(|s| (s - avg).powi(2)).sum::<f64>() / count as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Some(Self {
            min,
            // Guard against rounding pushing the mean outside [min, max]
            avg: avg.clamp(min, max),
            max,
            stddev,
            count,
        })
    }
}
