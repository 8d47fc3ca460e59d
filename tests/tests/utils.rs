use anyhow::Result;
use mock_service::{MockHandle, ServiceOptions};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use trainbench_runtime::http::{http_client, HttpPaymentClient, HttpSutClient};
use url::Url;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(
                "trainbench=debug,trainbench_runtime=debug,mock_service=info",
            ))
            .init();
    });
}

/// Mock service on ephemeral ports, with URLs for both halves.
#[allow(unused)]
pub struct Mock {
    pub handle: MockHandle,
    pub target: Url,
    pub payment: Url,
}

#[allow(unused)]
impl Mock {
    pub async fn spawn(options: ServiceOptions) -> Result<Self> {
        let handle = mock_service::spawn(options).await?;
        let target = Url::parse(&format!("http://{}", handle.sut_addr))?;
        let payment = Url::parse(&format!("http://{}", handle.payment_addr))?;
        Ok(Self {
            handle,
            target,
            payment,
        })
    }

    pub fn sut(&self) -> Result<HttpSutClient> {
        let client = http_client(Duration::from_secs(5))?;
        Ok(HttpSutClient::new(client, self.target.clone()))
    }

    pub fn payment_client(&self) -> Result<HttpPaymentClient> {
        let client = http_client(Duration::from_secs(5))?;
        Ok(HttpPaymentClient::new(client, self.payment.clone()))
    }
}
