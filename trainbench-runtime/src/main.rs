use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trainbench_runtime::{write_report, BenchRuntime};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trainbench=info,trainbench_runtime=info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let report = match BenchRuntime::new().with_args().run().await {
        Ok(report) => report,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = write_report(&report, std::io::stdout().lock()) {
        error!("{err}");
        return ExitCode::FAILURE;
    }
    println!();

    if report.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
