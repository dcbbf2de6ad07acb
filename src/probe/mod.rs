//! Probe capability
//!
//! A probe performs one latency measurement from a source node to a target node
//! and reports raw latency samples (or a failure). The measurement core is
//! agnostic to how this happens: ICMP round-trip over SSH, a TCP-level tool, or
//! a scripted test double all implement the same [`Probe`] trait.
//!
//! # Adapters
//!
//! - [`ssh::SshProbe`]: runs `ping` on the source node over SSH
//! - [`ping`]: text grammar for `ping` output (Linux iputils and BSD formats)
//! - [`mock::MockProbe`]: scripted behaviours for tests
//!
//! Each tool's text grammar lives in its own module so the executor, scheduler
//! and aggregator only ever see [`ProbeOutput`].

pub mod mock;
pub mod ping;
pub mod ssh;

use crate::inventory::Node;
use crate::mesh::Pair;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Summary statistics reported by the probing tool itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedStats {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Tool-reported deviation (e.g. ping's mdev)
    pub deviation_ms: f64,
}

/// Outcome of a probe run that completed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeOutput {
    /// Individual latency samples in milliseconds
    pub samples: Vec<f64>,
    /// Summary line reported by the tool, if any
    pub reported: Option<ReportedStats>,
    /// Packets received, when the tool reports it
    pub received: Option<u32>,
    /// Packet loss percentage, when the tool reports it
    pub packet_loss_pct: Option<f64>,
    /// Raw tool output, kept for diagnostics
    pub raw_text: String,
}

impl ProbeOutput {
    /// Output carrying only samples
    pub fn from_samples(samples: Vec<f64>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    /// Output with no extractable data, only raw text
    pub fn raw(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }
}

/// Probe failures
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Could not reach or execute on the source node
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tool ran but its output could not be understood
    #[error("unparseable probe output")]
    Unparseable { raw: String },
}

/// Latency probe between two nodes
///
/// Implementations must be cancel-safe: the executor drops the returned future
/// when the time budget runs out, and any underlying process or connection must
/// be abandoned at that point.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short name recorded in run metadata
    fn name(&self) -> &str;

    /// Measure latency from `source` to `target`
    ///
    /// `budget` is the wall-clock time the caller will wait; implementations may
    /// use it to size their own timeouts.
    async fn probe(
        &self,
        source: &Node,
        target: &Node,
        budget: Duration,
    ) -> Result<ProbeOutput, ProbeError>;
}

/// Yields the probe to use for a given pair
pub trait ProbeFactory: Send + Sync {
    fn probe_for(&self, pair: &Pair) -> Arc<dyn Probe>;

    /// Probe name for run metadata, when known without building a probe
    fn probe_name(&self) -> Option<String> {
        None
    }
}

/// One probe instance shared by every pair
#[derive(Clone)]
pub struct SharedProbe(pub Arc<dyn Probe>);

impl SharedProbe {
    pub fn new(probe: impl Probe + 'static) -> Self {
        Self(Arc::new(probe))
    }
}

impl ProbeFactory for SharedProbe {
    fn probe_for(&self, _pair: &Pair) -> Arc<dyn Probe> {
        Arc::clone(&self.0)
    }

    fn probe_name(&self) -> Option<String> {
        Some(self.0.name().to_string())
    }
}

impl<F> ProbeFactory for F
where
    F: Fn(&Pair) -> Arc<dyn Probe> + Send + Sync,
{
    fn probe_for(&self, pair: &Pair) -> Arc<dyn Probe> {
        self(pair)
    }
}
