use crate::error::ClientError;
use crate::score::StepOutcome;
use async_channel::Sender;
use governor::DefaultDirectRateLimiter;
use metrics_util::AtomicBucket;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use trainbench_core::EndpointKind;

/// Why a step did not produce a response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("phase deadline passed")]
    Deadline,

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Step hook shared by every journey task of a phase.
#[derive(Clone)]
pub(crate) struct StepHook {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub deadline: Instant,
    pub api_timeout: Duration,
    pub outcomes: Sender<StepOutcome>,
    pub latency: Arc<AtomicBucket<Duration>>,
}

tokio::task_local! {
    pub(crate) static STEP_HOOK: StepHook;
}

pub(crate) fn deadline_passed() -> bool {
    STEP_HOOK
        .try_with(|hook| Instant::now() >= hook.deadline)
        .unwrap_or(false)
}

/// Issues a call against the service.
///
/// Waits for the rate limiter, applies the per-call timeout and records latency. Nothing is
/// scored here: the caller emits [`StepOutcome::Success`] once the response has been verified
/// and classifies failures itself.
pub async fn step<T, F>(kind: EndpointKind, func: F) -> Result<T, StepError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let Ok(hook) = STEP_HOOK.try_with(|v| v.clone()) else {
        tracing::error!("No step hook available for {kind}.");
        return Ok(func.await?);
    };

    if Instant::now() >= hook.deadline {
        return Err(StepError::Deadline);
    }

    if let Some(limiter) = &hook.limiter {
        if tokio::time::timeout_at(hook.deadline, limiter.until_ready())
            .await
            .is_err()
        {
            return Err(StepError::Deadline);
        }
    }

    #[cfg(feature = "metrics")]
    let labels = kind.labels();
    let start = Instant::now();
    let res = match tokio::time::timeout(hook.api_timeout, func).await {
        Ok(res) => res,
        Err(_) => Err(ClientError::Timeout),
    };
    let elapsed = start.elapsed();
    hook.latency.push(elapsed);

    #[cfg(feature = "metrics")]
    metrics::histogram!(labels.latency).record(elapsed.as_secs_f64());

    match res {
        Ok(value) => {
            #[cfg(feature = "metrics")]
            metrics::counter!(labels.success).increment(1);

            Ok(value)
        }
        Err(err) => {
            #[cfg(feature = "metrics")]
            metrics::counter!(labels.error).increment(1);

            Err(StepError::Client(err))
        }
    }
}

/// Issues an unscored call, such as one to the payment service, under the per-call timeout.
pub async fn call<T, F>(func: F) -> Result<T, StepError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let Ok((deadline, api_timeout)) = STEP_HOOK.try_with(|v| (v.deadline, v.api_timeout)) else {
        return Ok(func.await?);
    };

    if Instant::now() >= deadline {
        return Err(StepError::Deadline);
    }

    match tokio::time::timeout(api_timeout, func).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(StepError::Client(ClientError::Timeout)),
    }
}

/// Streams a scored outcome for the step just verified or classified.
pub(crate) async fn emit(outcome: StepOutcome) {
    if let Ok(outcomes) = STEP_HOOK.try_with(|v| v.outcomes.clone()) {
        let _ = outcomes.send(outcome).await;
    }
}
