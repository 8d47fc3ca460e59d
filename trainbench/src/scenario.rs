//! Simulated user journeys.
//!
//! A journey runs its steps strictly in order against its own session. A failed step is
//! recorded in the phase tally and ends that journey only; other journeys carry on.
use crate::client::{DataProvider, PaymentClient, SutClient};
use crate::error::{BenchError, ClientError};
use crate::ledger::ReservationLedger;
use crate::score::StepOutcome;
use crate::tally::ErrorTallies;
use crate::transaction::{emit, step, StepError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use trainbench_core::{
    EndpointKind, PhaseKind, ReservationId, ReservationRequest, ScoreConfig, TravelWindow, User,
};

mod abnormal;
mod attack;
pub(crate) mod assert;
mod normal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JourneyKind {
    /// Sign up, book, pay and verify the booking.
    Normal,
    /// As `Normal`, then cancel and verify the cancellation.
    NormalCancel,
    /// Book on a peak fare day.
    Season,
    /// Repeated searches and seat listings.
    AttackSearch,
    /// Concurrent attempts to book seats that are already reserved.
    AttackReserveForReserved,
    /// A second user trying to cancel someone else's reservation.
    AttackReserveForOtherReservation,
    /// Requests that must be refused.
    AbnormalLogin,
}

impl JourneyKind {
    pub const PRE_TEST: [JourneyKind; 4] = [
        JourneyKind::Normal,
        JourneyKind::NormalCancel,
        JourneyKind::Season,
        JourneyKind::AbnormalLogin,
    ];

    /// Rotation used to fill a load level.
    pub const RUN_MIX: [JourneyKind; 7] = [
        JourneyKind::Normal,
        JourneyKind::AttackSearch,
        JourneyKind::NormalCancel,
        JourneyKind::AttackReserveForReserved,
        JourneyKind::Normal,
        JourneyKind::Season,
        JourneyKind::AttackReserveForOtherReservation,
    ];
}

impl fmt::Display for JourneyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JourneyKind::Normal => "normal",
            JourneyKind::NormalCancel => "normal-cancel",
            JourneyKind::Season => "season",
            JourneyKind::AttackSearch => "attack-search",
            JourneyKind::AttackReserveForReserved => "attack-reserve-for-reserved",
            JourneyKind::AttackReserveForOtherReservation => {
                "attack-reserve-for-other-reservation"
            }
            JourneyKind::AbnormalLogin => "abnormal-login",
        };
        write!(f, "{name}")
    }
}

/// How a journey ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyEnd {
    Completed,
    Deadline,
    Failed,
}

/// Reason a journey stopped before its last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stop {
    Deadline,
    Failed,
}

/// A reservation made and accepted during a journey.
#[derive(Debug, Clone)]
pub(crate) struct Booking {
    pub user: User,
    pub request: ReservationRequest,
    pub id: ReservationId,
    pub amount: u64,
}

pub struct Journey<C, P> {
    pub(crate) phase: PhaseKind,
    pub(crate) client: C,
    pub(crate) payment: Arc<P>,
    pub(crate) data: Arc<dyn DataProvider>,
    pub(crate) ledger: Arc<ReservationLedger>,
    pub(crate) tallies: Arc<ErrorTallies>,
    pub(crate) window: TravelWindow,
    pub(crate) score: ScoreConfig,
}

impl<C, P> Journey<C, P>
where
    C: SutClient + Send + Sync + 'static,
    P: PaymentClient + Send + Sync + 'static,
{
    #[instrument(name = "journey", skip(self), fields(phase = %self.phase))]
    pub async fn run(self, kind: JourneyKind) -> JourneyEnd {
        let res = match kind {
            JourneyKind::Normal => self.normal(false, None).await,
            JourneyKind::NormalCancel => self.normal(true, None).await,
            JourneyKind::Season => self.season().await,
            JourneyKind::AttackSearch => self.attack_search().await,
            JourneyKind::AttackReserveForReserved => self.attack_reserve_for_reserved().await,
            JourneyKind::AttackReserveForOtherReservation => {
                self.attack_reserve_for_other_reservation().await
            }
            JourneyKind::AbnormalLogin => self.abnormal_login().await,
        };

        match res {
            Ok(()) => JourneyEnd::Completed,
            Err(Stop::Deadline) => {
                debug!("Journey stopped at the phase deadline");
                JourneyEnd::Deadline
            }
            Err(Stop::Failed) => JourneyEnd::Failed,
        }
    }

    /// Runs a step whose response needs no further verification and scores it.
    pub(crate) async fn call<T, F>(&self, kind: EndpointKind, func: F) -> Result<T, Stop>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        let value = self.fetch(kind, func).await?;
        self.succeed(kind).await;
        Ok(value)
    }

    /// Runs a step without scoring it; the response is scored by [`check`](Self::check) or
    /// [`succeed`](Self::succeed) once verified. Any failure is classified from the client
    /// error and ends the journey.
    pub(crate) async fn fetch<T, F>(&self, kind: EndpointKind, func: F) -> Result<T, Stop>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match step(kind, func).await {
            Ok(value) => Ok(value),
            Err(StepError::Deadline) => Err(Stop::Deadline),
            Err(StepError::Client(err)) => {
                Err(self.fail(kind, BenchError::from_client(kind, err)).await)
            }
        }
    }

    pub(crate) async fn fail(&self, kind: EndpointKind, err: BenchError) -> Stop {
        let severity = err.severity;
        self.tallies.get(self.phase).add(err);
        emit(StepOutcome::Failure { kind, severity }).await;
        Stop::Failed
    }

    /// Scores a fetched response by the outcome of its verification.
    pub(crate) async fn check(
        &self,
        kind: EndpointKind,
        res: Result<(), BenchError>,
    ) -> Result<(), Stop> {
        match res {
            Ok(()) => {
                self.succeed(kind).await;
                Ok(())
            }
            Err(err) => Err(self.fail(kind, err).await),
        }
    }

    /// Counts a verified response, or an expected error response, as a successful step.
    pub(crate) async fn succeed(&self, kind: EndpointKind) {
        emit(StepOutcome::Success { kind }).await;
    }

    pub(crate) async fn extra(&self, kind: EndpointKind, score: u64) {
        if score > 0 {
            emit(StepOutcome::Extra { kind, score }).await;
        }
    }
}
