use mock_service::ServiceOptions;
use std::net::SocketAddr;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    let sut_addr: SocketAddr = "0.0.0.0:3000".parse()?;
    let payment_addr: SocketAddr = "0.0.0.0:5000".parse()?;
    mock_service::run(sut_addr, payment_addr, ServiceOptions::default()).await?;
    Ok(())
}
