//! Command line entry point that wires the HTTP clients into a [`Harness`].
use crate::error::RuntimeError;
use crate::http::{http_client, HttpPaymentClient, HttpSutClient};
use crate::notify::SlackNotifier;
use crate::random::RandomData;
use clap::Parser;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument};
use trainbench::{BenchReport, DataProvider, Harness};
use trainbench_core::{
    PhaseConfig, PhaseKind, ScoreConfig, DEFAULT_API_TIMEOUT, DEFAULT_APPLICATION_BUDGET,
    DEFAULT_CONCURRENCY, DEFAULT_POSTTEST_DEADLINE, DEFAULT_PRETEST_DEADLINE,
    DEFAULT_RUN_DEADLINE,
};
use url::Url;

const DEFAULT_TARGET: &str = "http://127.0.0.1:3000";
const DEFAULT_PAYMENT: &str = "http://127.0.0.1:5000";

#[derive(Parser, Debug)]
#[command(version = "0.1", about = "Benchmarks a train reservation service.")]
pub struct BenchCli {
    /// Base URL of the service under test.
    #[arg(short, long, default_value = DEFAULT_TARGET)]
    pub target: Url,

    /// Base URL of the payment service.
    #[arg(short, long, default_value = DEFAULT_PAYMENT)]
    pub payment: Url,

    /// Run phase duration, e.g. `60s` or `2m`.
    #[arg(short, long, value_parser = humantime::parse_duration, default_value = "60s")]
    pub deadline: Duration,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub pretest_deadline: Duration,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub posttest_deadline: Duration,

    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    pub api_timeout: Duration,

    /// Journeys in the first run wave.
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Upper bound on journeys per wave.
    #[arg(long)]
    pub max_level: Option<usize>,

    /// Requests per second across all journeys.
    #[arg(long)]
    pub tps: Option<NonZeroU32>,

    #[arg(long)]
    pub slack_webhook: Option<Url>,

    #[arg(long, default_value_t = DEFAULT_APPLICATION_BUDGET)]
    pub application_budget: u64,
}

/// Benchmark runtime over HTTP.
///
/// # Example
///
/// ```ignore
/// use trainbench_runtime::BenchRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     let report = BenchRuntime::new().with_args().run().await;
/// }
/// ```
pub struct BenchRuntime {
    target: Option<Url>,
    payment: Option<Url>,
    phases: Vec<PhaseConfig>,
    score: ScoreConfig,
    slack_webhook: Option<Url>,
    data: Arc<dyn DataProvider>,
}

impl Default for BenchRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchRuntime {
    pub fn new() -> Self {
        BenchRuntime {
            target: None,
            payment: None,
            phases: PhaseKind::ALL.into_iter().map(PhaseConfig::new).collect(),
            score: ScoreConfig::default(),
            slack_webhook: None,
            data: Arc::new(RandomData),
        }
    }

    /// Reads settings from the command line. See `--help`.
    ///
    /// ```ignore
    /// $ trainbench --target http://10.0.0.2:3000 --deadline 2m --tps 500
    /// ```
    pub fn with_args(self) -> Self {
        self.cli(BenchCli::parse())
    }

    pub fn cli(mut self, args: BenchCli) -> Self {
        self.target = Some(args.target);
        self.payment = Some(args.payment);
        self.slack_webhook = args.slack_webhook;
        self.score.application_budget = args.application_budget;

        for config in self.phases.iter_mut() {
            let deadline = match config.kind {
                PhaseKind::Initialize => config.deadline,
                PhaseKind::PreTest => args.pretest_deadline,
                PhaseKind::Run => args.deadline,
                PhaseKind::PostTest => args.posttest_deadline,
            };
            let mut updated = config.clone().deadline(deadline).tps_limit(args.tps);
            if config.kind != PhaseKind::Initialize {
                updated = updated.api_timeout(args.api_timeout);
            }
            if config.kind == PhaseKind::Run {
                updated = updated
                    .concurrency(args.concurrency)
                    .max_level(args.max_level);
            }
            *config = updated;
        }
        self
    }

    pub fn target(mut self, target: Url) -> Self {
        self.target = Some(target);
        self
    }

    pub fn payment(mut self, payment: Url) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn phase_config(mut self, config: PhaseConfig) -> Self {
        match self.phases.iter_mut().find(|c| c.kind == config.kind) {
            Some(existing) => *existing = config,
            None => self.phases.push(config),
        }
        self
    }

    pub fn score_config(mut self, score: ScoreConfig) -> Self {
        self.score = score;
        self
    }

    pub fn data(mut self, data: Arc<dyn DataProvider>) -> Self {
        self.data = data;
        self
    }

    pub fn config(&self, kind: PhaseKind) -> Option<&PhaseConfig> {
        self.phases.iter().find(|c| c.kind == kind)
    }

    #[instrument(name = "trainbench", skip_all)]
    pub async fn run(self) -> Result<BenchReport, RuntimeError> {
        let target = match self.target.clone() {
            Some(url) => url,
            None => Url::parse(DEFAULT_TARGET)?,
        };
        let payment_url = match self.payment.clone() {
            Some(url) => url,
            None => Url::parse(DEFAULT_PAYMENT)?,
        };
        info!("Benchmarking {target}, payment service at {payment_url}");

        let timeout = self
            .phases
            .iter()
            .map(|c| c.api_timeout)
            .max()
            .unwrap_or(DEFAULT_API_TIMEOUT);
        let client = http_client(timeout)?;

        let sut_client = client.clone();
        let payment = HttpPaymentClient::new(client.clone(), payment_url);
        let mut harness = Harness::new(
            move || HttpSutClient::new(sut_client.clone(), target.clone()),
            payment,
            self.data.clone(),
        )
        .score_config(self.score.clone());

        if let Some(webhook) = self.slack_webhook.clone() {
            info!("Critical errors are posted to Slack");
            harness = harness.notifier(Arc::new(SlackNotifier::new(client, webhook)));
        }
        for config in &self.phases {
            debug!("{} phase: {config:?}", config.kind);
            harness = harness.phase_config(config.clone());
        }

        let report = harness.run_all().await;
        if !report.passed {
            error!("Benchmark failed");
        }
        Ok(report)
    }
}

/// Writes the report as pretty JSON to `out`.
pub fn write_report<W: std::io::Write>(report: &BenchReport, out: W) -> Result<(), RuntimeError> {
    serde_json::to_writer_pretty(out, report)?;
    Ok(())
}
