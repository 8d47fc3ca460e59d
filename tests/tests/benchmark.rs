mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use mock_service::ServiceOptions;
    use std::num::NonZeroU32;
    use std::time::Duration;
    use trainbench::prelude::*;
    use trainbench_runtime::BenchRuntime;

    fn runtime(mock: &Mock) -> BenchRuntime {
        BenchRuntime::new()
            .target(mock.target.clone())
            .payment(mock.payment.clone())
            .phase_config(PhaseConfig::new(PhaseKind::PreTest).deadline(Duration::from_secs(10)))
            .phase_config(
                PhaseConfig::new(PhaseKind::Run)
                    .deadline(Duration::from_secs(2))
                    .api_timeout(Duration::from_secs(2))
                    .concurrency(2)
                    .max_level(Some(4)),
            )
            .phase_config(PhaseConfig::new(PhaseKind::PostTest).deadline(Duration::from_secs(5)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(60_000)]
    async fn full_benchmark_over_http() {
        init();
        let mock = Mock::spawn(ServiceOptions::default()).await.unwrap();

        let report = runtime(&mock).run().await.unwrap();

        assert!(report.passed, "{report:#?}");
        assert_eq!(report.phases.len(), 4);
        assert!(report.score > 0);

        let run = &report.phases[2];
        assert_eq!(run.kind, PhaseKind::Run);
        assert!(run.statistics.level >= 2);
        assert!(run.statistics.steps > 0);
        assert!(run.statistics.latency_p99 >= run.statistics.latency_p50);

        let post = &report.phases[3];
        assert_eq!(post.tally.counts.critical, 0, "{:?}", post.tally.messages);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["phases"][0]["kind"], "initialize");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(60_000)]
    async fn unreachable_payment_fails_initialize() {
        init();
        let mock = Mock::spawn(ServiceOptions::default()).await.unwrap();

        let report = runtime(&mock)
            .payment(url::Url::parse("http://127.0.0.1:1").unwrap())
            .run()
            .await
            .unwrap();

        assert!(!report.passed);
        assert_eq!(report.score, 0);
        assert_eq!(report.phases.len(), 1);
        assert!(report.phases[0].tally.counts.critical > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(60_000)]
    async fn throttled_service_still_passes_pre_test() {
        init();
        let mock = Mock::spawn(ServiceOptions {
            tps_limit: NonZeroU32::new(200),
            ..ServiceOptions::default()
        })
        .await
        .unwrap();

        let report = runtime(&mock)
            .phase_config(
                PhaseConfig::new(PhaseKind::PreTest)
                    .deadline(Duration::from_secs(10))
                    .tps_limit(NonZeroU32::new(50)),
            )
            .run()
            .await
            .unwrap();

        let pre = &report.phases[1];
        assert_eq!(pre.kind, PhaseKind::PreTest);
        assert!(pre.passed, "{:?}", pre.tally.messages);
    }
}
