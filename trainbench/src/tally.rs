//! Per-phase error tallies.
use crate::client::Notifier;
use crate::error::{BenchError, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, warn};
use trainbench_core::{PhaseKind, ScoreConfig};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyCounts {
    pub critical: u64,
    pub application: u64,
    pub timeout: u64,
    pub temporary: u64,
}

impl TallyCounts {
    /// Timeouts and temporary errors together.
    pub fn trivial(&self) -> u64 {
        self.timeout + self.temporary
    }

    pub fn total(&self) -> u64 {
        self.critical + self.application + self.trivial()
    }

    fn increment(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Application => self.application += 1,
            Severity::Timeout => self.timeout += 1,
            Severity::Temporary => self.temporary += 1,
        }
    }
}

#[derive(Default)]
struct TallyState {
    msgs: Vec<String>,
    counts: TallyCounts,
}

/// Running error counters for one phase.
///
/// Every added error increments its severity counter. Messages are kept in arrival order;
/// deduplication only applies to [`ErrorTally::unique_msgs`].
pub struct ErrorTally {
    phase: PhaseKind,
    config: ScoreConfig,
    state: RwLock<TallyState>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ErrorTally {
    pub fn new(phase: PhaseKind, config: ScoreConfig) -> Self {
        Self {
            phase,
            config,
            state: RwLock::new(TallyState::default()),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    pub fn add(&self, err: BenchError) {
        let msg = err.display_message();
        match err.severity {
            Severity::Critical => {
                error!(phase = %self.phase, "{msg}");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(err.severity, &msg);
                }
            }
            _ => warn!(phase = %self.phase, "{msg}"),
        }

        let mut state = self.write();
        state.counts.increment(err.severity);
        state.msgs.push(msg);
    }

    pub fn counts(&self) -> TallyCounts {
        self.read().counts
    }

    pub fn is_error(&self) -> bool {
        self.counts().total() > 0
    }

    /// True once a critical error was seen or a severity budget is exhausted.
    pub fn is_failure(&self) -> bool {
        let counts = self.counts();
        let over = |count: u64, budget: Option<u64>| budget.is_some_and(|b| count >= b);

        counts.critical > 0
            || counts.application >= self.config.application_budget
            || over(counts.timeout, self.config.timeout_budget)
            || over(counts.temporary, self.config.temporary_budget)
    }

    pub fn penalty(&self) -> u64 {
        penalty(&self.counts(), &self.config)
    }

    pub fn msgs(&self) -> Vec<String> {
        self.read().msgs.clone()
    }

    /// Distinct messages in first-seen order.
    pub fn unique_msgs(&self) -> Vec<String> {
        let state = self.read();
        let mut seen = HashSet::new();
        state
            .msgs
            .iter()
            .filter(|msg| seen.insert(msg.as_str()))
            .cloned()
            .collect()
    }

    pub fn reset(&self) {
        *self.write() = TallyState::default();
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            phase: self.phase,
            counts: self.counts(),
            messages: self.unique_msgs(),
            penalty: self.penalty(),
            failed: self.is_failure(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TallyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TallyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn penalty(counts: &TallyCounts, config: &ScoreConfig) -> u64 {
    let mut penalty = counts.application * config.application_penalty_weight;

    let trivial = counts.trivial();
    if trivial > config.trivial_penalty_threshold {
        let over = (trivial - config.trivial_penalty_threshold)
            .checked_div(config.trivial_penalty_per_count)
            .unwrap_or(0);
        penalty += config.trivial_penalty_weight * (1 + over);
    }

    penalty
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub phase: PhaseKind,
    pub counts: TallyCounts,
    pub messages: Vec<String>,
    pub penalty: u64,
    pub failed: bool,
}

/// One tally per phase, shared by every task of a benchmark run.
pub struct ErrorTallies {
    tallies: [ErrorTally; 4],
}

impl ErrorTallies {
    pub fn new(config: ScoreConfig, notifier: Option<Arc<dyn Notifier>>) -> Self {
        let tallies = PhaseKind::ALL.map(|phase| {
            let tally = ErrorTally::new(phase, config.clone());
            match &notifier {
                Some(notifier) => tally.with_notifier(notifier.clone()),
                None => tally,
            }
        });
        Self { tallies }
    }

    pub fn get(&self, phase: PhaseKind) -> &ErrorTally {
        let idx = PhaseKind::ALL
            .iter()
            .position(|p| *p == phase)
            .unwrap_or_default();
        &self.tallies[idx]
    }

    pub fn snapshot(&self) -> Vec<TallySnapshot> {
        self.tallies.iter().map(ErrorTally::snapshot).collect()
    }
}

impl Default for ErrorTallies {
    fn default() -> Self {
        Self::new(ScoreConfig::default(), None)
    }
}
