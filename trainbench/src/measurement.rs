use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Latency quantiles over every step of a phase.
#[derive(Debug, Clone)]
pub struct LatencyDigest {
    count: usize,
    digest: TDigest<K1>,
}

impl Default for LatencyDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyDigest {
    pub fn new() -> Self {
        Self {
            count: 0,
            digest: TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE),
        }
    }

    pub fn populate(&mut self, latencies: &[Duration]) {
        for latency in latencies {
            self.digest.insert(latency.as_secs_f64());
        }
        self.count += latencies.len();
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn quantile(&self, quantile: f64) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }

        let secs = self.digest.quantile(quantile);
        let secs = if secs.is_finite() && secs >= 0. {
            secs
        } else {
            error!("Latency digest produced {secs} for quantile {quantile}");
            0.
        };

        Duration::from_secs_f64(secs)
    }
}

impl fmt::Display for LatencyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "steps={}, p50={}, p90={}, p99={}",
            self.count,
            humantime::format_duration(self.quantile(0.5)),
            humantime::format_duration(self.quantile(0.9)),
            humantime::format_duration(self.quantile(0.99)),
        )
    }
}
