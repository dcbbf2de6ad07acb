//! Measurement executor
//!
//! Drives a single probe invocation for one pair and maps every possible outcome
//! onto a [`MeasurementResult`]:
//!
//! | Outcome | Result |
//! | --- | --- |
//! | samples extracted | `Measurement` (min/avg/max/spread) |
//! | tool summary with a received count | `Measurement` from the reported summary |
//! | nothing extractable | `Failed { parse_error }` with a raw excerpt |
//! | budget exceeded | `Failed { timeout }` |
//! | probe error | `Failed { transport_error }` |
//!
//! The executor holds no state; a failure here never escapes to sibling pairs.

use crate::mesh::Pair;
use crate::probe::{Probe, ProbeError, ProbeOutput};
use crate::stats::{Failure, FailureCause, Measurement, MeasurementResult, SampleSummary};
use chrono::Utc;
use std::time::Duration;

/// Characters of raw probe output kept on parse failures
pub const RAW_EXCERPT_CHARS: usize = 500;

/// First `max_chars` characters of `text`
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Run one probe for `pair`, bounded by `time_budget`
///
/// When the budget runs out the probe future is dropped, which cancels any
/// transport it started.
pub async fn execute(pair: &Pair, probe: &dyn Probe, time_budget: Duration) -> MeasurementResult {
    let outcome = tokio::time::timeout(
        time_budget,
        probe.probe(&pair.source, &pair.target, time_budget),
    )
    .await;

    match outcome {
        Ok(Ok(output)) => from_output(pair, output),
        Ok(Err(ProbeError::Unparseable { raw })) => failed(
            pair,
            FailureCause::ParseError,
            Some("probe output could not be parsed".to_string()),
            Some(excerpt(&raw, RAW_EXCERPT_CHARS)),
        ),
        Ok(Err(err)) => failed(pair, FailureCause::TransportError, Some(err.to_string()), None),
        Err(_elapsed) => failed(
            pair,
            FailureCause::Timeout,
            Some(format!("no result within {:.1}s", time_budget.as_secs_f64())),
            None,
        ),
    }
}

/// Normalize a completed probe run
fn from_output(pair: &Pair, output: ProbeOutput) -> MeasurementResult {
    let samples: Vec<f64> = output
        .samples
        .iter()
        .copied()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .collect();

    let reported_deviation = output
        .reported
        .map(|r| r.deviation_ms)
        .filter(|d| d.is_finite() && *d >= 0.0);

    if let Some(summary) = SampleSummary::from_samples(&samples) {
        let spread = if summary.count >= 2 {
            summary.stddev
        } else {
            reported_deviation.unwrap_or(0.0)
        };
        return MeasurementResult::Measurement(Measurement {
            cloud: pair.source.cloud.clone(),
            region: pair.source.region.clone(),
            source_id: pair.source.id.clone(),
            target_id: pair.target.id.clone(),
            source_address: pair.source.connect_address.clone(),
            target_address: pair.target.target_address.clone(),
            min_ms: summary.min,
            avg_ms: summary.avg,
            max_ms: summary.max,
            spread_ms: spread,
            sample_count: summary.count as u32,
            packet_loss_pct: output.packet_loss_pct,
            timestamp: Utc::now(),
        });
    }

    // Quiet-mode tools only print a summary line
    let received = output.received.filter(|n| *n > 0);
    if let (Some(reported), Some(received)) = (output.reported, received) {
        let values = [reported.min_ms, reported.avg_ms, reported.max_ms];
        let consistent = values.iter().all(|v| v.is_finite() && *v >= 0.0)
            && reported.min_ms <= reported.avg_ms
            && reported.avg_ms <= reported.max_ms;
        if consistent {
            return MeasurementResult::Measurement(Measurement {
                cloud: pair.source.cloud.clone(),
                region: pair.source.region.clone(),
                source_id: pair.source.id.clone(),
                target_id: pair.target.id.clone(),
                source_address: pair.source.connect_address.clone(),
                target_address: pair.target.target_address.clone(),
                min_ms: reported.min_ms,
                avg_ms: reported.avg_ms,
                max_ms: reported.max_ms,
                spread_ms: reported_deviation.unwrap_or(0.0),
                sample_count: received,
                packet_loss_pct: output.packet_loss_pct,
                timestamp: Utc::now(),
            });
        }
    }

    failed(
        pair,
        FailureCause::ParseError,
        Some("no latency samples in probe output".to_string()),
        Some(excerpt(&output.raw_text, RAW_EXCERPT_CHARS)),
    )
}

/// Failure record for a pair
pub fn failed(
    pair: &Pair,
    cause: FailureCause,
    detail: Option<String>,
    raw_excerpt: Option<String>,
) -> MeasurementResult {
    MeasurementResult::Failed(Failure {
        cloud: pair.source.cloud.clone(),
        region: pair.source.region.clone(),
        source_id: pair.source.id.clone(),
        target_id: pair.target.id.clone(),
        cause,
        detail,
        raw_excerpt,
    })
}
