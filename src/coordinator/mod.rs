//! Run coordinator
//!
//! Orchestrates one measurement run end to end:
//!
//! 1. Validate the inventory (the only fatal failure)
//! 2. Plan pairs per (cloud, region) group
//! 3. Record same-zone pairs as skipped
//! 4. Schedule the work list through the executor
//! 5. Stamp run metadata and aggregate into a [`MeasurementSet`]
//!
//! A run always produces a set, even when every pair failed.

use crate::inventory::Inventory;
use crate::mesh::{self, Pair, SymmetryMode};
use crate::probe::ProbeFactory;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::stats::aggregator::{aggregate, MeasurementSet, RunMetadata};
use crate::stats::{MeasurementResult, SkipReason, Skipped};
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub symmetry: SymmetryMode,
    /// Samples requested per pair (recorded in metadata)
    pub sample_count: u32,
    /// Wall-clock budget per pair
    pub time_budget: Duration,
    /// Concurrent probes per group
    pub max_parallel: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            symmetry: SymmetryMode::default(),
            sample_count: 100,
            time_budget: Duration::from_secs(60),
            max_parallel: 10,
        }
    }
}

/// Drives a full mesh measurement
pub struct MeshCoordinator {
    inventory: Inventory,
    settings: RunSettings,
    factory: Arc<dyn ProbeFactory>,
}

impl MeshCoordinator {
    pub fn new(inventory: Inventory, settings: RunSettings, factory: Arc<dyn ProbeFactory>) -> Self {
        Self {
            inventory,
            settings,
            factory,
        }
    }

    /// Execute the run
    pub async fn run(&self) -> Result<MeasurementSet> {
        self.inventory
            .validate()
            .context("Cannot start measurement run")?;

        let started_at = Utc::now();
        let plan = mesh::plan(self.inventory.nodes(), self.settings.symmetry);

        tracing::info!(
            nodes = self.inventory.len(),
            groups = self.inventory.groups().len(),
            pairs = plan.work.len(),
            same_zone = plan.same_zone.len(),
            mode = %self.settings.symmetry,
            "Planned measurement run"
        );

        let probe_name = self.factory.probe_name().unwrap_or_default();

        let mut results: Vec<MeasurementResult> = plan.same_zone.iter().map(skipped).collect();
        if !results.is_empty() {
            tracing::info!(count = results.len(), "Skipping same-zone pairs");
        }

        let scheduler = Scheduler::new(
            Arc::clone(&self.factory),
            SchedulerConfig {
                max_parallel: self.settings.max_parallel,
                time_budget: self.settings.time_budget,
            },
        );
        results.extend(scheduler.run(plan.work).await);

        let metadata = RunMetadata {
            started_at,
            finished_at: Utc::now(),
            probe: probe_name,
            runner_host: runner_host(),
            mode: self.settings.symmetry,
            sample_count: self.settings.sample_count,
            time_budget_ms: self.settings.time_budget.as_millis() as u64,
            max_parallel: self.settings.max_parallel,
            totals: Default::default(),
            clouds: self.inventory.clouds(),
            regions: self.inventory.regions(),
        };

        let set = aggregate(results, metadata);
        let counts = set.counts();
        tracing::info!(
            measurements = counts.measurements,
            skipped = counts.skipped,
            failed = counts.failed,
            "Measurement run complete"
        );

        Ok(set)
    }
}

fn skipped(pair: &Pair) -> MeasurementResult {
    MeasurementResult::Skipped(Skipped {
        cloud: pair.source.cloud.clone(),
        region: pair.source.region.clone(),
        source_id: pair.source.id.clone(),
        target_id: pair.target.id.clone(),
        reason: SkipReason::SameZone,
    })
}

fn runner_host() -> Option<String> {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryEntry;
    use crate::probe::mock::{MockBehavior, MockProbe};
    use crate::probe::SharedProbe;
    use crate::stats::aggregator::{GroupField, Order};
    use crate::stats::FailureCause;
    use std::collections::BTreeMap;

    fn entry(cloud: &str, region: &str, az: &str) -> InventoryEntry {
        InventoryEntry {
            az_id: Some(az.to_string()),
            cloud: cloud.to_string(),
            region: region.to_string(),
            public_ip: format!("198.51.100.{}", az.len()),
            private_ip: format!("10.0.0.{}", az.len()),
        }
    }

    /// Region X: A, B, C. Region Y: D, E.
    fn scenario() -> Inventory {
        let mut entries = BTreeMap::new();
        for id in ["A", "B", "C"] {
            entries.insert(id.to_string(), entry("aws", "X", id));
        }
        for id in ["D", "E"] {
            entries.insert(id.to_string(), entry("aws", "Y", id));
        }
        Inventory::from_entries(entries).unwrap()
    }

    fn coordinator(inventory: Inventory, probe: MockProbe, settings: RunSettings) -> MeshCoordinator {
        MeshCoordinator::new(inventory, settings, Arc::new(SharedProbe::new(probe)))
    }

    #[tokio::test]
    async fn test_full_mesh_scenario() {
        let probe = MockProbe::new()
            .with_default(MockBehavior::Samples(vec![1.0]))
            .with_pair("B", "A", MockBehavior::Samples(vec![0.4]))
            .with_pair("D", "E", MockBehavior::Samples(vec![2.5]));

        let set = coordinator(scenario(), probe.clone(), RunSettings::default())
            .run()
            .await
            .unwrap();

        assert_eq!(set.counts().measurements, 8);
        assert_eq!(set.counts().skipped, 0);
        assert_eq!(set.counts().failed, 0);
        assert_eq!(probe.calls().len(), 8);
        assert!(set.results().iter().all(|r| r.source_id() != r.target_id()));
        assert!(set
            .results()
            .iter()
            .all(|r| (r.region() == "X") == ["A", "B", "C"].contains(&r.source_id())));

        assert_eq!(set.lowest().unwrap().source_id, "B");
        assert_eq!(set.highest().unwrap().source_id, "D");
        assert_eq!(set.top(1, Order::Ascending)[0].avg_ms, 0.4);
    }

    #[tokio::test]
    async fn test_unique_undirected_scenario() {
        let settings = RunSettings {
            symmetry: SymmetryMode::UniqueUndirected,
            ..Default::default()
        };
        let set = coordinator(scenario(), MockProbe::new(), settings)
            .run()
            .await
            .unwrap();

        assert_eq!(set.counts().measurements, 4);
        assert_eq!(set.metadata().mode, SymmetryMode::UniqueUndirected);
    }

    #[tokio::test]
    async fn test_same_zone_pairs_are_skipped() {
        let mut entries = BTreeMap::new();
        entries.insert("n1".to_string(), entry("aws", "r1", "use1-az1"));
        entries.insert("n2".to_string(), entry("aws", "r1", "use1-az1"));
        entries.insert("n3".to_string(), entry("aws", "r1", "use1-az2"));
        let inventory = Inventory::from_entries(entries).unwrap();

        let probe = MockProbe::new();
        let set = coordinator(inventory, probe.clone(), RunSettings::default())
            .run()
            .await
            .unwrap();

        // 3 * 2 directed pairs, n1<->n2 share a zone
        assert_eq!(set.counts().total(), 6);
        assert_eq!(set.counts().skipped, 2);
        assert_eq!(set.counts().measurements, 4);
        assert_eq!(probe.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_failing_group_does_not_stop_run() {
        let probe = MockProbe::new()
            .with_pair("D", "E", MockBehavior::Fail("no route".into()))
            .with_pair("E", "D", MockBehavior::Hang);
        let settings = RunSettings {
            time_budget: Duration::from_millis(100),
            ..Default::default()
        };

        let set = coordinator(scenario(), probe, settings).run().await.unwrap();

        assert_eq!(set.counts().measurements, 6);
        assert_eq!(set.counts().failed, 2);
        let causes: Vec<FailureCause> = set.failures().map(|f| f.cause).collect();
        assert!(causes.contains(&FailureCause::TransportError));
        assert!(causes.contains(&FailureCause::Timeout));

        let groups = set.group_by(&[GroupField::Region]);
        assert!(groups.contains_key(&vec!["X".to_string()]));
        assert!(!groups.contains_key(&vec!["Y".to_string()]));
    }

    #[tokio::test]
    async fn test_everything_fails_still_returns_set() {
        let probe = MockProbe::new().with_default(MockBehavior::Fail("down".into()));
        let set = coordinator(scenario(), probe, RunSettings::default())
            .run()
            .await
            .unwrap();
        assert_eq!(set.counts().failed, 8);
        assert!(set.overall().is_none());
    }

    #[tokio::test]
    async fn test_metadata_is_stamped() {
        let settings = RunSettings {
            sample_count: 20,
            max_parallel: 3,
            time_budget: Duration::from_secs(5),
            ..Default::default()
        };
        let set = coordinator(scenario(), MockProbe::new(), settings)
            .run()
            .await
            .unwrap();

        let meta = set.metadata();
        assert_eq!(meta.probe, "mock");
        assert_eq!(meta.sample_count, 20);
        assert_eq!(meta.max_parallel, 3);
        assert_eq!(meta.time_budget_ms, 5_000);
        assert_eq!(meta.clouds, vec!["aws"]);
        assert_eq!(meta.regions["aws"], vec!["X", "Y"]);
        assert_eq!(meta.totals.measurements, 8);
        assert!(meta.finished_at >= meta.started_at);
    }

    #[tokio::test]
    async fn test_single_node_groups_produce_nothing() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), entry("aws", "r1", "a"));
        entries.insert("b".to_string(), entry("azure", "r1", "b"));
        let inventory = Inventory::from_entries(entries).unwrap();

        let probe = MockProbe::new();
        let set = coordinator(inventory, probe.clone(), RunSettings::default())
            .run()
            .await
            .unwrap();
        assert_eq!(set.counts().total(), 0);
        assert!(probe.calls().is_empty());
        assert_eq!(set.metadata().probe, "mock");
    }

    #[tokio::test]
    async fn test_factory_builds_one_probe_per_pair() {
        use crate::probe::Probe;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let factory = move |_pair: &Pair| -> Arc<dyn Probe> {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(MockProbe::new())
        };

        let set = MeshCoordinator::new(scenario(), RunSettings::default(), Arc::new(factory))
            .run()
            .await
            .unwrap();

        assert_eq!(set.counts().measurements, 8);
        assert_eq!(built.load(Ordering::SeqCst), 8);
        assert_eq!(set.metadata().probe, "");
    }
}
