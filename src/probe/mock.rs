//! Mock probe for testing
//!
//! Simulates probe outcomes without touching the network, making scheduler and
//! executor tests fast and deterministic.
//!
//! # Features
//!
//! - Scripted behaviour per (source id, target id), with a default
//! - Simulated latency via delays and hangs
//! - Tracks every invocation and the peak number of concurrent invocations
//!
//! # Example
//!
//! ```
//! use latmesh::probe::mock::{MockBehavior, MockProbe};
//!
//! let probe = MockProbe::new()
//!     .with_default(MockBehavior::Samples(vec![1.0, 2.0]))
//!     .with_pair("a", "b", MockBehavior::Fail("connection refused".into()));
//!
//! assert_eq!(probe.calls().len(), 0);
//! ```

use super::{Probe, ProbeError, ProbeOutput, ReportedStats};
use crate::inventory::Node;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted probe outcome
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Succeed with these samples (ms)
    Samples(Vec<f64>),
    /// Succeed with only a tool summary and a received count
    Reported(ReportedStats, u32),
    /// Complete without extractable data
    Raw(String),
    /// Grammar-level failure
    Unparseable(String),
    /// Transport failure with message
    Fail(String),
    /// Sleep, then succeed with samples
    Delay(Duration, Vec<f64>),
    /// Never complete
    Hang,
    /// Panic inside the probe
    Panic,
}

/// Record of one probe invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub source_id: String,
    pub target_id: String,
}

/// Mock probe
#[derive(Clone)]
pub struct MockProbe {
    default: MockBehavior,
    per_pair: HashMap<(String, String), MockBehavior>,
    calls: Arc<Mutex<Vec<CallRecord>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter even when the probe future is dropped
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockProbe {
    /// Mock probe that succeeds with a single 1ms sample
    pub fn new() -> Self {
        Self {
            default: MockBehavior::Samples(vec![1.0]),
            per_pair: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Behaviour for pairs without a specific script
    pub fn with_default(mut self, behavior: MockBehavior) -> Self {
        self.default = behavior;
        self
    }

    /// Behaviour for one directed pair
    pub fn with_pair(mut self, source_id: &str, target_id: &str, behavior: MockBehavior) -> Self {
        self.per_pair
            .insert((source_id.to_string(), target_id.to_string()), behavior);
        self
    }

    /// All invocations so far
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneous invocations observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, source: &Node, target: &Node) -> MockBehavior {
        self.per_pair
            .get(&(source.id.clone(), target.id.clone()))
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for MockProbe {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(
        &self,
        source: &Node,
        target: &Node,
        _budget: Duration,
    ) -> Result<ProbeOutput, ProbeError> {
        self.calls.lock().unwrap().push(CallRecord {
            source_id: source.id.clone(),
            target_id: target.id.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(Arc::clone(&self.in_flight));

        match self.behavior_for(source, target) {
            MockBehavior::Samples(samples) => Ok(ProbeOutput {
                raw_text: format!("{} samples", samples.len()),
                ..ProbeOutput::from_samples(samples)
            }),
            MockBehavior::Reported(stats, received) => Ok(ProbeOutput {
                reported: Some(stats),
                received: Some(received),
                ..Default::default()
            }),
            MockBehavior::Raw(text) => Ok(ProbeOutput::raw(text)),
            MockBehavior::Unparseable(raw) => Err(ProbeError::Unparseable { raw }),
            MockBehavior::Fail(message) => Err(ProbeError::Transport(message)),
            MockBehavior::Delay(delay, samples) => {
                tokio::time::sleep(delay).await;
                Ok(ProbeOutput::from_samples(samples))
            }
            MockBehavior::Hang => std::future::pending().await,
            MockBehavior::Panic => panic!("mock probe panic for {} -> {}", source.id, target.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::node;

    #[tokio::test]
    async fn test_default_behavior() {
        let probe = MockProbe::new();
        let out = probe
            .probe(&node("a", "aws", "r1"), &node("b", "aws", "r1"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.samples, vec![1.0]);
        assert_eq!(probe.calls().len(), 1);
        assert_eq!(probe.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_per_pair_behavior() {
        let probe = MockProbe::new().with_pair("a", "b", MockBehavior::Fail("refused".into()));
        let a = node("a", "aws", "r1");
        let b = node("b", "aws", "r1");

        let err = probe.probe(&a, &b, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Transport(ref m) if m == "refused"));

        // reverse direction falls back to the default
        assert!(probe.probe(&b, &a, Duration::from_secs(1)).await.is_ok());
        assert_eq!(
            probe.calls(),
            vec![
                CallRecord { source_id: "a".into(), target_id: "b".into() },
                CallRecord { source_id: "b".into(), target_id: "a".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_in_flight_released_on_drop() {
        let probe = MockProbe::new().with_default(MockBehavior::Hang);
        let a = node("a", "aws", "r1");
        let b = node("b", "aws", "r1");

        let result =
            tokio::time::timeout(Duration::from_millis(20), probe.probe(&a, &b, Duration::ZERO)).await;
        assert!(result.is_err());
        assert_eq!(probe.in_flight.load(Ordering::SeqCst), 0);
    }
}
