//! Measurement scheduler
//!
//! Runs a work list through the executor, one group at a time.
//!
//! ## Concurrency Control
//!
//! - Groups ((cloud, region) partitions) are processed sequentially, in order
//! - Within a group, at most `max_parallel` probes run at once (semaphore)
//! - Each pair runs in its own task; results are gathered through a single
//!   `JoinSet::join_next` loop in completion order
//!
//! A hung pair holds one permit until its time budget expires. Every submitted
//! pair yields exactly one result: a task that panics or is cancelled is
//! recorded as a transport failure once the group drains.

use crate::executor::{self, execute};
use crate::inventory::GroupKey;
use crate::mesh::Pair;
use crate::probe::ProbeFactory;
use crate::stats::{FailureCause, MeasurementResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Detail recorded for pairs whose task never reported back
pub const ABORTED_DETAIL: &str = "probe task aborted";

/// Scheduler settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Concurrent probes per group
    pub max_parallel: usize,
    /// Wall-clock budget per probe
    pub time_budget: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 10,
            time_budget: Duration::from_secs(60),
        }
    }
}

/// Runs pairs through the executor with bounded per-group parallelism
pub struct Scheduler {
    factory: Arc<dyn ProbeFactory>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(factory: Arc<dyn ProbeFactory>, config: SchedulerConfig) -> Self {
        Self { factory, config }
    }

    /// Run every pair, returning one result per pair
    ///
    /// Result order within a group is completion order.
    pub async fn run(&self, work: Vec<Pair>) -> Vec<MeasurementResult> {
        let mut groups: BTreeMap<GroupKey, Vec<Pair>> = BTreeMap::new();
        for pair in work {
            groups.entry(pair.group()).or_default().push(pair);
        }

        let mut results = Vec::new();
        for (key, pairs) in groups {
            results.extend(self.run_group(&key, pairs).await);
        }
        results
    }

    async fn run_group(&self, key: &GroupKey, pairs: Vec<Pair>) -> Vec<MeasurementResult> {
        let max_parallel = self.config.max_parallel.max(1);
        let time_budget = self.config.time_budget;

        tracing::info!(
            cloud = %key.cloud,
            region = %key.region,
            pairs = pairs.len(),
            max_parallel,
            "Running {} measurements in {}",
            pairs.len(),
            key
        );

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut tasks: JoinSet<(usize, MeasurementResult)> = JoinSet::new();

        // Slot per submitted pair, cleared when its result arrives
        let mut outstanding: Vec<Option<Pair>> = Vec::with_capacity(pairs.len());

        for (index, pair) in pairs.into_iter().enumerate() {
            outstanding.push(Some(pair.clone()));
            let probe = self.factory.probe_for(&pair);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => execute(&pair, probe.as_ref(), time_budget).await,
                    Err(_closed) => executor::failed(
                        &pair,
                        FailureCause::TransportError,
                        Some("scheduler shut down before probe start".to_string()),
                        None,
                    ),
                };
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(outstanding.len());

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = outstanding.get_mut(index) {
                        *slot = None;
                    }
                    log_result(&result);
                    results.push(result);
                }
                Err(join_error) => {
                    let reason = if join_error.is_panic() { "panicked" } else { "was cancelled" };
                    tracing::error!(group = %key, "Probe task {}", reason);
                }
            }
        }

        for pair in outstanding.into_iter().flatten() {
            tracing::warn!(group = %key, pair = %pair, "No result from probe task, recording failure");
            results.push(executor::failed(
                &pair,
                FailureCause::TransportError,
                Some(ABORTED_DETAIL.to_string()),
                None,
            ));
        }

        results
    }
}

/// Run `work` with a probe per pair from `factory`
pub async fn run(
    work: Vec<Pair>,
    factory: Arc<dyn ProbeFactory>,
    max_parallel: usize,
    time_budget: Duration,
) -> Vec<MeasurementResult> {
    Scheduler::new(factory, SchedulerConfig { max_parallel, time_budget })
        .run(work)
        .await
}

fn log_result(result: &MeasurementResult) {
    match result {
        MeasurementResult::Measurement(m) => {
            tracing::info!("  {} -> {}: {:.3}ms", m.source_id, m.target_id, m.avg_ms);
        }
        MeasurementResult::Failed(f) => {
            tracing::warn!(
                cause = %f.cause,
                detail = f.detail.as_deref().unwrap_or(""),
                "  {} -> {}: ERROR - {}",
                f.source_id,
                f.target_id,
                f.cause
            );
        }
        MeasurementResult::Skipped(s) => {
            tracing::debug!("  {} -> {}: skipped ({})", s.source_id, s.target_id, s.reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::node;
    use crate::mesh::{self, SymmetryMode};
    use crate::probe::mock::{MockBehavior, MockProbe};
    use crate::probe::{Probe, SharedProbe};
    use std::collections::HashSet;

    fn shared(probe: &MockProbe) -> Arc<dyn ProbeFactory> {
        Arc::new(SharedProbe(Arc::new(probe.clone()) as Arc<dyn Probe>))
    }

    fn result_ids(results: &[MeasurementResult]) -> Vec<(String, String)> {
        let mut ids: Vec<(String, String)> = results
            .iter()
            .map(|r| (r.source_id().to_string(), r.target_id().to_string()))
            .collect();
        ids.sort();
        ids
    }

    fn pair_ids(pairs: &[Pair]) -> Vec<(String, String)> {
        let mut ids: Vec<(String, String)> = pairs
            .iter()
            .map(|p| (p.source.id.clone(), p.target.id.clone()))
            .collect();
        ids.sort();
        ids
    }

    fn fleet() -> Vec<crate::inventory::Node> {
        vec![
            node("a1", "aws", "r1"),
            node("a2", "aws", "r1"),
            node("a3", "aws", "r1"),
            node("b1", "aws", "r2"),
            node("b2", "aws", "r2"),
        ]
    }

    #[tokio::test]
    async fn test_one_result_per_pair() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::FullMeshDirected);
        assert_eq!(pairs.len(), 8);

        let probe = MockProbe::new();
        let results = run(pairs.clone(), shared(&probe), 3, Duration::from_secs(1)).await;

        assert_eq!(results.len(), pairs.len());
        assert_eq!(result_ids(&results), pair_ids(&pairs));
        assert_eq!(probe.calls().len(), pairs.len());
    }

    #[tokio::test]
    async fn test_no_pair_dropped_under_timeouts() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::FullMeshDirected);
        let probe = MockProbe::new()
            .with_pair("a1", "a2", MockBehavior::Hang)
            .with_pair("a3", "a1", MockBehavior::Hang)
            .with_pair("b2", "b1", MockBehavior::Fail("refused".into()));

        let results = run(pairs.clone(), shared(&probe), 2, Duration::from_millis(100)).await;

        assert_eq!(result_ids(&results), pair_ids(&pairs));
        let timeouts = results
            .iter()
            .filter_map(|r| r.as_failure())
            .filter(|f| f.cause == FailureCause::Timeout)
            .count();
        assert_eq!(timeouts, 2);
        let transport = results
            .iter()
            .filter_map(|r| r.as_failure())
            .filter(|f| f.cause == FailureCause::TransportError)
            .count();
        assert_eq!(transport, 1);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded_per_group() {
        let nodes: Vec<_> = (0..5).map(|i| node(&format!("n{}", i), "aws", "r1")).collect();
        let pairs = mesh::generate(&nodes, SymmetryMode::FullMeshDirected);
        let probe = MockProbe::new()
            .with_default(MockBehavior::Delay(Duration::from_millis(20), vec![1.0]));

        let results = run(pairs.clone(), shared(&probe), 3, Duration::from_secs(5)).await;

        assert_eq!(results.len(), 20);
        assert!(probe.peak_concurrency() <= 3);
        assert!(probe.peak_concurrency() >= 1);
    }

    #[tokio::test]
    async fn test_groups_run_sequentially() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::FullMeshDirected);
        let probe = MockProbe::new()
            .with_default(MockBehavior::Delay(Duration::from_millis(10), vec![1.0]));

        let results = run(pairs, shared(&probe), 16, Duration::from_secs(5)).await;

        // r1 holds 6 pairs and r2 holds 2; with groups in sequence the peak never
        // exceeds the larger group
        assert!(probe.peak_concurrency() <= 6);
        let regions: Vec<&str> = results.iter().map(|r| r.region()).collect();
        let first_r2 = regions.iter().position(|r| *r == "r2").unwrap();
        assert!(regions[..first_r2].iter().all(|r| *r == "r1"));
        assert!(regions[first_r2..].iter().all(|r| *r == "r2"));
    }

    #[tokio::test]
    async fn test_hung_pair_does_not_block_others() {
        let nodes: Vec<_> = (0..3).map(|i| node(&format!("n{}", i), "aws", "r1")).collect();
        let pairs = mesh::generate(&nodes, SymmetryMode::FullMeshDirected);
        let probe = MockProbe::new().with_pair("n0", "n1", MockBehavior::Hang);

        let start = std::time::Instant::now();
        let results = run(pairs, shared(&probe), 2, Duration::from_millis(300)).await;

        assert_eq!(results.len(), 6);
        assert_eq!(results.iter().filter(|r| r.is_measurement()).count(), 5);
        // one slot stays busy with the hung pair; the rest complete without waiting on it
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_panicking_probe_is_accounted_for() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::UniqueUndirected);
        let probe = MockProbe::new().with_pair("a1", "a2", MockBehavior::Panic);

        let results = run(pairs.clone(), shared(&probe), 4, Duration::from_secs(1)).await;

        assert_eq!(result_ids(&results), pair_ids(&pairs));
        let aborted: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_failure())
            .filter(|f| f.detail.as_deref() == Some(ABORTED_DETAIL))
            .collect();
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].source_id, "a1");
        assert_eq!(aborted[0].target_id, "a2");
    }

    #[tokio::test]
    async fn test_all_failures_still_complete() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::FullMeshDirected);
        let probe = MockProbe::new().with_default(MockBehavior::Fail("unreachable".into()));

        let results = run(pairs.clone(), shared(&probe), 4, Duration::from_secs(1)).await;

        assert_eq!(results.len(), pairs.len());
        assert!(results.iter().all(|r| r.as_failure().is_some()));
        let regions: HashSet<&str> = results.iter().map(|r| r.region()).collect();
        assert_eq!(regions.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_parallelism_is_clamped() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::UniqueUndirected);
        let probe = MockProbe::new();
        let results = run(pairs.clone(), shared(&probe), 0, Duration::from_secs(1)).await;
        assert_eq!(results.len(), pairs.len());
        assert_eq!(probe.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_factory_per_pair() {
        let pairs = mesh::generate(&fleet(), SymmetryMode::UniqueUndirected);
        let factory = |pair: &Pair| -> Arc<dyn Probe> {
            let latency = if pair.group().region == "r1" { 1.0 } else { 2.0 };
            Arc::new(MockProbe::new().with_default(MockBehavior::Samples(vec![latency])))
        };

        let results = run(pairs, Arc::new(factory), 2, Duration::from_secs(1)).await;
        for result in &results {
            let m = result.as_measurement().unwrap();
            let expected = if m.region == "r1" { 1.0 } else { 2.0 };
            assert_eq!(m.avg_ms, expected);
        }
    }

    #[tokio::test]
    async fn test_empty_work() {
        let results = run(Vec::new(), shared(&MockProbe::new()), 4, Duration::from_secs(1)).await;
        assert!(results.is_empty());
    }
}
