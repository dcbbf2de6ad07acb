//! JSON output formatting
//!
//! Exports a run as `{"metadata": {...}, "results": [...]}`, each result
//! carrying a `type` tag (`measurement`, `skipped`, `failed`). The same document
//! can be read back and re-aggregated, which is how report mode works.
//!
//! The inventory used for a run is saved next to it in the input format.

use crate::inventory::Inventory;
use crate::stats::aggregator::{MeasurementSet, RunMetadata};
use crate::stats::MeasurementResult;
use crate::Result;
use anyhow::Context;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Results file written into the output directory
pub const RESULTS_FILE: &str = "results.json";

/// Inventory snapshot written into the output directory
pub const INVENTORY_FILE: &str = "inventory.json";

/// Results document as read back from disk
#[derive(Debug, Deserialize)]
struct ResultsDocument {
    metadata: RunMetadata,
    #[serde(default)]
    results: Vec<MeasurementResult>,
}

/// Write the result set to a file
pub fn write_results(output_path: &Path, set: &MeasurementSet, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create results file: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, set)?;
    } else {
        serde_json::to_writer(writer, set)?;
    }

    Ok(())
}

/// Read a results file and rebuild its set
pub fn read_results(path: &Path) -> Result<MeasurementSet> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;

    results_from_str(&contents)
        .with_context(|| format!("Invalid results file: {}", path.display()))
}

/// Parse a results document
///
/// Totals are recomputed from the results, so a hand-edited file cannot
/// disagree with itself.
pub fn results_from_str(contents: &str) -> Result<MeasurementSet> {
    let document: ResultsDocument =
        serde_json::from_str(contents).context("Failed to parse results JSON")?;

    Ok(MeasurementSet::from_results(document.results, document.metadata))
}

/// Save the inventory in its input format
pub fn write_inventory(output_path: &Path, inventory: &Inventory) -> Result<()> {
    let json = inventory
        .to_json_pretty()
        .context("Failed to serialize inventory")?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write inventory file: {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::aggregator::tests::{failure, measurement};
    use crate::stats::aggregator::{aggregate, GroupField, Order};

    fn sample_set() -> MeasurementSet {
        aggregate(
            vec![
                measurement("us-east-1", "use1-az1", "use1-az2", 0.61),
                measurement("us-east-1", "use1-az2", "use1-az1", 0.58),
                failure("us-east-1", "use1-az1", "use1-az4"),
                measurement("eu-west-1", "euw1-az1", "euw1-az2", 1.12),
            ],
            RunMetadata {
                probe: "ssh-ping".to_string(),
                sample_count: 100,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_document_shape() {
        let json = serde_json::to_value(sample_set()).unwrap();
        assert_eq!(json["metadata"]["probe"], "ssh-ping");
        assert_eq!(json["metadata"]["totals"]["measurements"], 3);
        assert_eq!(json["metadata"]["totals"]["failed"], 1);
        assert_eq!(json["results"].as_array().unwrap().len(), 4);
        assert_eq!(json["results"][0]["type"], "measurement");
        assert_eq!(json["results"][2]["type"], "failed");
        assert_eq!(json["results"][2]["cause"], "transport_error");
    }

    #[test]
    fn test_results_file_reproduces_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE);
        let set = sample_set();

        write_results(&path, &set, true).unwrap();
        let loaded = read_results(&path).unwrap();

        assert_eq!(loaded.results(), set.results());
        assert_eq!(loaded.metadata(), set.metadata());
        assert_eq!(loaded.counts(), set.counts());
        assert_eq!(loaded.group_by(&[GroupField::Region]), set.group_by(&[GroupField::Region]));
        assert_eq!(loaded.overall(), set.overall());
        assert_eq!(
            loaded.top(2, Order::Descending)[0].avg_ms,
            set.top(2, Order::Descending)[0].avg_ms
        );
    }

    #[test]
    fn test_totals_recomputed_on_read() {
        let json = r#"{
            "metadata": {
                "started_at": "2024-03-05T14:07:09Z",
                "finished_at": "2024-03-05T14:09:00Z",
                "probe": "ssh-ping",
                "mode": "full_mesh_directed",
                "sample_count": 100,
                "time_budget_ms": 60000,
                "max_parallel": 10,
                "totals": {"measurements": 99, "skipped": 0, "failed": 0}
            },
            "results": [
                {"type": "skipped", "cloud": "aws", "region": "r1", "source_id": "a", "target_id": "b", "reason": "same_zone"}
            ]
        }"#;

        let set = results_from_str(json).unwrap();
        assert_eq!(set.counts().measurements, 0);
        assert_eq!(set.counts().skipped, 1);
        assert_eq!(set.metadata().regions["aws"], vec!["r1"]);
    }

    #[test]
    fn test_read_invalid_results() {
        assert!(results_from_str("{\"results\": []}").is_err());
        assert!(read_results(Path::new("/nonexistent/results.json")).is_err());
    }

    #[test]
    fn test_write_inventory() {
        let inventory = Inventory::from_json_str(
            r#"{"use1-az1": {"region": "us-east-1", "public_ip": "54.0.0.1", "private_ip": "10.0.1.10"}}"#,
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INVENTORY_FILE);
        write_inventory(&path, &inventory).unwrap();

        let reloaded = crate::inventory::source::load_file(&path).unwrap();
        assert_eq!(reloaded.entries(), inventory.entries());
    }
}
