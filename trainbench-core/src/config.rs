use crate::{
    CoreError, APPLICATION_PENALTY_WEIGHT, DEFAULT_API_TIMEOUT, DEFAULT_APPLICATION_BUDGET,
    DEFAULT_CONCURRENCY, DEFAULT_POSTTEST_DEADLINE, DEFAULT_PRETEST_DEADLINE,
    DEFAULT_RUN_DEADLINE, INITIALIZE_TIMEOUT, MAX_RESERVATION_DAYS, RESERVATION_START_DATE,
    RESERVED_SEAT_EXTRA_SCORE, TRIVIAL_PENALTY_PER_COUNT, TRIVIAL_PENALTY_THRESHOLD,
    TRIVIAL_PENALTY_WEIGHT,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseKind {
    Initialize,
    PreTest,
    Run,
    PostTest,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Initialize,
        PhaseKind::PreTest,
        PhaseKind::Run,
        PhaseKind::PostTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Initialize => "initialize",
            PhaseKind::PreTest => "pre-test",
            PhaseKind::Run => "run",
            PhaseKind::PostTest => "post-test",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub kind: PhaseKind,
    #[serde_as(as = "DurationSeconds")]
    pub deadline: Duration,
    #[serde_as(as = "DurationSeconds")]
    pub api_timeout: Duration,
    /// Number of concurrent journeys in the first wave.
    pub concurrency: usize,
    pub tps_limit: Option<NonZeroU32>,
    /// Upper bound on the load level reached during the run phase.
    pub max_level: Option<usize>,
}

impl PhaseConfig {
    pub fn new(kind: PhaseKind) -> Self {
        let deadline = match kind {
            PhaseKind::Initialize => INITIALIZE_TIMEOUT,
            PhaseKind::PreTest => DEFAULT_PRETEST_DEADLINE,
            PhaseKind::Run => DEFAULT_RUN_DEADLINE,
            PhaseKind::PostTest => DEFAULT_POSTTEST_DEADLINE,
        };
        let api_timeout = match kind {
            PhaseKind::Initialize => INITIALIZE_TIMEOUT,
            _ => DEFAULT_API_TIMEOUT,
        };

        Self {
            kind,
            deadline,
            api_timeout,
            concurrency: DEFAULT_CONCURRENCY,
            tps_limit: None,
            max_level: None,
        }
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn api_timeout(mut self, api_timeout: Duration) -> Self {
        self.api_timeout = api_timeout;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn tps_limit(mut self, tps_limit: Option<NonZeroU32>) -> Self {
        self.tps_limit = tps_limit;
        self
    }

    pub fn max_level(mut self, max_level: Option<usize>) -> Self {
        self.max_level = max_level;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Application errors tolerated before a phase fails.
    pub application_budget: u64,
    pub timeout_budget: Option<u64>,
    pub temporary_budget: Option<u64>,
    pub application_penalty_weight: u64,
    pub trivial_penalty_threshold: u64,
    pub trivial_penalty_weight: u64,
    pub trivial_penalty_per_count: u64,
    pub reserved_seat_extra_score: u64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            application_budget: DEFAULT_APPLICATION_BUDGET,
            timeout_budget: None,
            temporary_budget: None,
            application_penalty_weight: APPLICATION_PENALTY_WEIGHT,
            trivial_penalty_threshold: TRIVIAL_PENALTY_THRESHOLD,
            trivial_penalty_weight: TRIVIAL_PENALTY_WEIGHT,
            trivial_penalty_per_count: TRIVIAL_PENALTY_PER_COUNT,
            reserved_seat_extra_score: RESERVED_SEAT_EXTRA_SCORE,
        }
    }
}

/// Range of bookable travel dates, announced by the service at initialize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelWindow {
    pub start: Date,
    pub days: u16,
}

impl TravelWindow {
    pub fn new(days: u16) -> Result<Self, CoreError> {
        if days == 0 || days > MAX_RESERVATION_DAYS {
            return Err(CoreError::InvalidTravelWindow(days));
        }
        Ok(Self {
            start: RESERVATION_START_DATE,
            days,
        })
    }

    /// Date `offset` days into the window, clamped to its last day. An empty window built by
    /// hand collapses onto its start date.
    pub fn day(&self, offset: u16) -> Date {
        let offset = offset.min(self.days.saturating_sub(1));
        self.start
            .checked_add(time::Duration::days(offset as i64))
            .unwrap_or(self.start)
    }

    pub fn last_day(&self) -> Date {
        self.day(self.days.saturating_sub(1))
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.last_day()
    }
}

impl Default for TravelWindow {
    fn default() -> Self {
        Self {
            start: RESERVATION_START_DATE,
            days: MAX_RESERVATION_DAYS,
        }
    }
}
