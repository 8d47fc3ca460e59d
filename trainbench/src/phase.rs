//! Benchmark phases and the harness that drives them.
use crate::client::{DataProvider, Notifier, PaymentClient, SutClient};
use crate::error::{BenchError, Severity};
use crate::final_check::final_check;
use crate::ledger::{LedgerSnapshot, ReservationLedger};
use crate::measurement::LatencyDigest;
use crate::scenario::{Journey, JourneyEnd, JourneyKind};
use crate::score::{EndpointScore, ScoreBoard, StepOutcome};
use crate::tally::{ErrorTallies, ErrorTally, TallySnapshot};
use crate::transaction::{self, emit, step, StepError, StepHook, STEP_HOOK};
use arc_swap::ArcSwap;
use async_channel::bounded;
use governor::{Quota, RateLimiter};
use metrics_util::AtomicBucket;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use trainbench_core::{
    EndpointKind, PhaseConfig, PhaseKind, PhaseStatistics, ScoreConfig, TravelWindow,
    RESULT_QUEUE_CAPACITY,
};

/// Outcome of a single phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub kind: PhaseKind,
    pub passed: bool,
    pub statistics: PhaseStatistics,
    pub endpoints: Vec<EndpointScore>,
    pub tally: TallySnapshot,
    #[serde(skip)]
    pub ledger: LedgerSnapshot,
}

impl PhaseResult {
    pub fn total_score(&self) -> u64 {
        self.statistics.total_score
    }
}

/// Outcome of a full benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    pub passed: bool,
    /// Run phase score, or zero if any phase failed.
    pub score: u64,
    pub phases: Vec<PhaseResult>,
}

/// Runs benchmark phases against a service.
///
/// Every journey gets its own client from `client_factory` so that sessions are never shared.
/// The ledger and the error tallies live for the whole benchmark.
pub struct Harness<C, P> {
    client_factory: Arc<dyn Fn() -> C + Send + Sync>,
    payment: Arc<P>,
    data: Arc<dyn DataProvider>,
    ledger: Arc<ReservationLedger>,
    tallies: Arc<ErrorTallies>,
    notifier: Option<Arc<dyn Notifier>>,
    score: ScoreConfig,
    phases: HashMap<PhaseKind, PhaseConfig>,
    window: ArcSwap<TravelWindow>,
}

impl<C, P> Harness<C, P>
where
    C: SutClient + Send + Sync + 'static,
    P: PaymentClient + Send + Sync + 'static,
{
    pub fn new<F>(client_factory: F, payment: P, data: Arc<dyn DataProvider>) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        let score = ScoreConfig::default();
        Self {
            client_factory: Arc::new(client_factory),
            payment: Arc::new(payment),
            data,
            ledger: Arc::new(ReservationLedger::new()),
            tallies: Arc::new(ErrorTallies::new(score.clone(), None)),
            notifier: None,
            score,
            phases: PhaseKind::ALL
                .into_iter()
                .map(|kind| (kind, PhaseConfig::new(kind)))
                .collect(),
            window: ArcSwap::from_pointee(TravelWindow::default()),
        }
    }

    pub fn score_config(mut self, score: ScoreConfig) -> Self {
        self.score = score;
        self.tallies = Arc::new(ErrorTallies::new(
            self.score.clone(),
            self.notifier.clone(),
        ));
        self
    }

    /// Critical errors of every phase are forwarded to `notifier`.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self.tallies = Arc::new(ErrorTallies::new(
            self.score.clone(),
            self.notifier.clone(),
        ));
        self
    }

    pub fn phase_config(mut self, config: PhaseConfig) -> Self {
        self.phases.insert(config.kind, config);
        self
    }

    pub fn config(&self, kind: PhaseKind) -> PhaseConfig {
        self.phases
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| PhaseConfig::new(kind))
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub fn tallies(&self) -> &ErrorTallies {
        &self.tallies
    }

    pub fn window(&self) -> TravelWindow {
        **self.window.load()
    }

    /// Runs every phase in order, skipping the rest once one fails.
    #[instrument(name = "benchmark", skip_all)]
    pub async fn run_all(&self) -> BenchReport {
        let mut phases = Vec::with_capacity(PhaseKind::ALL.len());
        for kind in PhaseKind::ALL {
            let deadline = self.config(kind).deadline;
            let result = self.run_phase(kind, deadline).await;
            let passed = result.passed;
            phases.push(result);

            if !passed {
                error!("{kind} phase failed, skipping the remaining phases");
                break;
            }
        }

        let passed = phases.len() == PhaseKind::ALL.len() && phases.iter().all(|p| p.passed);
        let score = if passed {
            phases
                .iter()
                .find(|p| p.kind == PhaseKind::Run)
                .map_or(0, PhaseResult::total_score)
        } else {
            0
        };
        info!("Benchmark finished. passed={passed}, score={score}");

        BenchReport {
            passed,
            score,
            phases,
        }
    }

    /// Runs a single phase, bounded by `deadline`.
    #[instrument(name = "phase", skip(self), fields(phase = %kind))]
    pub async fn run_phase(&self, kind: PhaseKind, deadline: Duration) -> PhaseResult {
        let config = self.config(kind).deadline(deadline);
        let tally = self.tallies.get(kind);
        tally.reset();
        info!(
            "Starting {kind} phase. deadline={}, api_timeout={}",
            humantime::format_duration(config.deadline),
            humantime::format_duration(config.api_timeout)
        );

        let board = Arc::new(ScoreBoard::new());
        let (tx, rx) = bounded(RESULT_QUEUE_CAPACITY);
        let aggregator = {
            let board = board.clone();
            tokio::spawn(async move {
                while let Ok(outcome) = rx.recv().await {
                    board.record(&outcome);
                }
            })
        };

        let latency = Arc::new(AtomicBucket::new());
        let hook = StepHook {
            limiter: config
                .tps_limit
                .map(|tps| Arc::new(RateLimiter::direct(Quota::per_second(tps)))),
            deadline: Instant::now() + config.deadline,
            api_timeout: config.api_timeout,
            outcomes: tx,
            latency: latency.clone(),
        };

        let (level, ledger) = STEP_HOOK
            .scope(hook.clone(), self.phase_body(&config, &hook, tally))
            .await;

        drop(hook);
        if let Err(err) = aggregator.await {
            error!("Score aggregator failed: {err}");
        }

        let mut digest = LatencyDigest::new();
        latency.clear_with(|latencies| digest.populate(latencies));

        let tally = tally.snapshot();
        let raw_score = board.raw_score();
        let statistics = PhaseStatistics {
            raw_score,
            penalty: tally.penalty,
            total_score: raw_score.saturating_sub(tally.penalty),
            steps: board.steps(),
            level,
            latency_p50: digest.quantile(0.50),
            latency_p90: digest.quantile(0.90),
            latency_p99: digest.quantile(0.99),
        };
        info!(
            "{kind} phase finished. score={}, penalty={}, steps={}, latency={digest}",
            statistics.total_score, statistics.penalty, statistics.steps
        );

        PhaseResult {
            kind,
            passed: !tally.failed,
            statistics,
            endpoints: board.report(),
            tally,
            ledger,
        }
    }

    /// Returns the highest load level reached and the ledger as the phase left it.
    async fn phase_body(
        &self,
        config: &PhaseConfig,
        hook: &StepHook,
        tally: &ErrorTally,
    ) -> (usize, LedgerSnapshot) {
        let level = match config.kind {
            PhaseKind::Initialize => {
                self.initialize(tally).await;
                1
            }
            PhaseKind::PreTest => {
                let mut wave = JoinSet::new();
                for kind in JourneyKind::PRE_TEST {
                    self.spawn_journey(&mut wave, config.kind, hook, kind);
                }
                self.join_wave(wave, hook).await;
                JourneyKind::PRE_TEST.len()
            }
            PhaseKind::Run => self.load(config, hook, tally).await,
            PhaseKind::PostTest => return (1, self.reconcile(tally).await),
        };

        (level, self.ledger_snapshot(tally))
    }

    async fn initialize(&self, tally: &ErrorTally) {
        let client = (self.client_factory)();
        match step(EndpointKind::Initialize, client.initialize()).await {
            Ok(res) => match TravelWindow::new(res.available_days) {
                Ok(window) => {
                    info!("Reservations open for {} days", window.days);
                    self.window.store(Arc::new(window));
                    emit(StepOutcome::Success {
                        kind: EndpointKind::Initialize,
                    })
                    .await;
                }
                Err(err) => fail_initialize(tally, err.into()).await,
            },
            Err(err) => {
                let err = match err {
                    StepError::Deadline => BenchError::critical(format!(
                        "{}: {}",
                        EndpointKind::Initialize,
                        StepError::Deadline
                    )),
                    StepError::Client(err) => {
                        BenchError::from_client(EndpointKind::Initialize, err)
                    }
                };
                fail_initialize(tally, err).await;
            }
        }

        if let Err(err) = transaction::call(self.payment.initialize()).await {
            tally.add(BenchError::critical(format!(
                "payment service initialize: {err}"
            )));
        }
    }

    /// Runs waves of journeys, one level larger after each completed wave.
    async fn load(&self, config: &PhaseConfig, hook: &StepHook, tally: &ErrorTally) -> usize {
        let mut level = config.concurrency;
        let mut peak = 0;
        let mut next = 0;

        while Instant::now() < hook.deadline {
            let mut wave = JoinSet::new();
            for _ in 0..level {
                let kind = JourneyKind::RUN_MIX[next % JourneyKind::RUN_MIX.len()];
                next += 1;
                self.spawn_journey(&mut wave, config.kind, hook, kind);
            }
            peak = peak.max(level);

            let completed = self.join_wave(wave, hook).await;
            if tally.is_failure() {
                warn!("Run phase is failing, no further load is added");
                break;
            }
            if !completed {
                break;
            }

            level = match config.max_level {
                Some(max) => (level + 1).min(max),
                None => level + 1,
            };
            debug!("Raising load level to {level}");
        }

        peak
    }

    fn spawn_journey(
        &self,
        wave: &mut JoinSet<JourneyEnd>,
        phase: PhaseKind,
        hook: &StepHook,
        kind: JourneyKind,
    ) {
        let journey = Journey {
            phase,
            client: (self.client_factory)(),
            payment: self.payment.clone(),
            data: self.data.clone(),
            ledger: self.ledger.clone(),
            tallies: self.tallies.clone(),
            window: self.window(),
            score: self.score.clone(),
        };
        wave.spawn(STEP_HOOK.scope(hook.clone(), journey.run(kind)));
    }

    /// Waits for every journey of a wave.
    ///
    /// No step starts after the deadline and a step in flight ends within the API timeout, so
    /// journeys still running past both are aborted.
    async fn join_wave(&self, mut wave: JoinSet<JourneyEnd>, hook: &StepHook) -> bool {
        let grace = hook.deadline + hook.api_timeout;
        let joined = tokio::time::timeout_at(grace, async {
            let mut completed = true;
            while let Some(res) = wave.join_next().await {
                match res {
                    Ok(JourneyEnd::Deadline) => completed = false,
                    Ok(_) => {}
                    Err(err) => error!("Journey task failed: {err}"),
                }
            }
            completed
        })
        .await;

        match joined {
            Ok(completed) => completed,
            Err(_) => {
                warn!("Aborting {} journeys past the deadline", wave.len());
                wave.shutdown().await;
                false
            }
        }
    }

    async fn reconcile(&self, tally: &ErrorTally) -> LedgerSnapshot {
        let settlement = match transaction::call(self.payment.settlement()).await {
            Ok(settlement) => settlement,
            Err(err) => {
                tally.add(BenchError::critical(format!(
                    "payment settlement unavailable: {err}"
                )));
                return self.ledger_snapshot(tally);
            }
        };

        let snapshot = self.ledger_snapshot(tally);
        for err in final_check(&snapshot, &settlement) {
            tally.add(err);
        }
        snapshot
    }

    fn ledger_snapshot(&self, tally: &ErrorTally) -> LedgerSnapshot {
        self.ledger.snapshot().unwrap_or_else(|err| {
            tally.add(err.into());
            LedgerSnapshot::default()
        })
    }
}

async fn fail_initialize(tally: &ErrorTally, err: BenchError) {
    let err = BenchError::critical(err.message);
    tally.add(err);
    emit(StepOutcome::Failure {
        kind: EndpointKind::Initialize,
        severity: Severity::Critical,
    })
    .await;
}
