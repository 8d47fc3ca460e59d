use crate::error::Severity;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use trainbench_core::EndpointKind;

/// Result of a single scripted step, streamed from journeys to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Success { kind: EndpointKind },
    Failure { kind: EndpointKind, severity: Severity },
    Extra { kind: EndpointKind, score: u64 },
}

impl StepOutcome {
    pub fn kind(&self) -> EndpointKind {
        match self {
            StepOutcome::Success { kind }
            | StepOutcome::Failure { kind, .. }
            | StepOutcome::Extra { kind, .. } => *kind,
        }
    }
}

#[derive(Default)]
struct EndpointCounters {
    hits: AtomicU64,
    errors: AtomicU64,
    extra: AtomicU64,
}

/// Per-endpoint counters keyed by endpoint kind.
pub struct ScoreBoard {
    counters: [EndpointCounters; EndpointKind::ALL.len()],
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self {
            counters: Default::default(),
        }
    }

    fn counters(&self, kind: EndpointKind) -> &EndpointCounters {
        &self.counters[kind as usize]
    }

    pub fn record(&self, outcome: &StepOutcome) {
        let counters = self.counters(outcome.kind());
        match outcome {
            StepOutcome::Success { .. } => {
                counters.hits.fetch_add(1, Ordering::Relaxed);
            }
            StepOutcome::Failure { .. } => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
            }
            StepOutcome::Extra { score, .. } => {
                counters.extra.fetch_add(*score, Ordering::Relaxed);
            }
        }
    }

    pub fn hits(&self, kind: EndpointKind) -> u64 {
        self.counters(kind).hits.load(Ordering::Relaxed)
    }

    pub fn errors(&self, kind: EndpointKind) -> u64 {
        self.counters(kind).errors.load(Ordering::Relaxed)
    }

    pub fn extra(&self, kind: EndpointKind) -> u64 {
        self.counters(kind).extra.load(Ordering::Relaxed)
    }

    /// Sum of `weight * hits + extra` over every endpoint kind.
    pub fn raw_score(&self) -> u64 {
        EndpointKind::ALL
            .iter()
            .map(|kind| kind.weight() * self.hits(*kind) + self.extra(*kind))
            .sum()
    }

    pub fn steps(&self) -> u64 {
        EndpointKind::ALL
            .iter()
            .map(|kind| self.hits(*kind) + self.errors(*kind))
            .sum()
    }

    pub fn report(&self) -> Vec<EndpointScore> {
        EndpointKind::ALL
            .iter()
            .map(|kind| EndpointScore {
                kind: *kind,
                path: kind.to_string(),
                hits: self.hits(*kind),
                errors: self.errors(*kind),
                extra: self.extra(*kind),
            })
            .filter(|score| score.hits + score.errors + score.extra > 0)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointScore {
    pub kind: EndpointKind,
    pub path: String,
    pub hits: u64,
    pub errors: u64,
    pub extra: u64,
}
