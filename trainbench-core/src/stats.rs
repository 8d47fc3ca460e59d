use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// Score and latency summary for a single phase.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStatistics {
    /// Weighted endpoint hits plus extra score.
    pub raw_score: u64,
    pub penalty: u64,
    /// `raw_score - penalty`, floored at zero.
    pub total_score: u64,
    pub steps: u64,
    /// Highest load level reached.
    pub level: usize,
    #[serde_as(as = "DurationMilliSeconds")]
    pub latency_p50: Duration,
    #[serde_as(as = "DurationMilliSeconds")]
    pub latency_p90: Duration,
    #[serde_as(as = "DurationMilliSeconds")]
    pub latency_p99: Duration,
}
