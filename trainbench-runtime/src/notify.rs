use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};
use trainbench::{Notifier, Severity};
use url::Url;

const RETRIES: usize = 10;
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// Posts critical errors to a Slack incoming webhook.
///
/// Delivery happens on a background task and is retried a few times before being dropped.
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook: Url,
}

impl SlackNotifier {
    pub fn new(client: Client, webhook: Url) -> Self {
        Self { client, webhook }
    }

    async fn deliver(self, text: String) {
        let message = SlackMessage { text: &text };
        for attempt in 1..=RETRIES {
            let res = self
                .client
                .post(self.webhook.clone())
                .json(&message)
                .send()
                .await
                .and_then(|res| res.error_for_status());
            match res {
                Ok(_) => {
                    debug!("Notification delivered after {attempt} attempt(s)");
                    return;
                }
                Err(err) => warn!("Notification attempt {attempt} failed: {err}"),
            }
            tokio::time::sleep(RETRY_DELAY).await;
        }
        error!("Giving up on notification: {text}");
    }
}

impl Notifier for SlackNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        let text = format!("[{severity}] {message}");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(self.clone().deliver(text));
            }
            Err(_) => error!("No runtime to deliver notification: {text}"),
        }
    }
}
