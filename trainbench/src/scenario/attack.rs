use super::{assert, Journey, Stop};
use crate::client::{PaymentClient, SutClient};
use crate::error::{BenchError, ClientError};
use crate::transaction::{deadline_passed, step, StepError};
use futures_util::future::join_all;
use tracing::{debug, error};
use trainbench_core::{EndpointKind, SeatQuery, TrainSearchQuery, CAR_COUNT};

const ATTACK_ROUNDS: usize = 10;

/// Concurrent attempts to book seats that are already held.
const REBOOK_ATTEMPTS: usize = 10;

impl<C, P> Journey<C, P>
where
    C: SutClient + Send + Sync + 'static,
    P: PaymentClient + Send + Sync + 'static,
{
    /// Hammers the read-only search endpoints without booking anything.
    pub(crate) async fn attack_search(&self) -> Result<(), Stop> {
        for _ in 0..ATTACK_ROUNDS {
            if deadline_passed() {
                return Err(Stop::Deadline);
            }

            let (origin, destination) = self.data.section();
            let (adults, children) = self.data.passengers();
            let query = TrainSearchQuery {
                date: self.window.day(self.data.day_offset(self.window.days)),
                origin: origin.clone(),
                destination: destination.clone(),
                train_class: None,
                adults,
                children,
            };

            let trains = self
                .fetch(EndpointKind::SearchTrains, self.client.search_trains(&query))
                .await?;
            self.check(EndpointKind::SearchTrains, assert::trains(&query, &trains))
                .await?;

            let train = &trains[self.data.pick(trains.len())];
            let seat_query = SeatQuery {
                date: query.date,
                train_class: train.train_class,
                train_name: train.train_name.clone(),
                car_number: self.data.pick(CAR_COUNT as usize) as u8 + 1,
                origin,
                destination,
            };
            let seat_map = self
                .fetch(EndpointKind::ListSeats, self.client.list_seats(&seat_query))
                .await?;
            self.check(
                EndpointKind::ListSeats,
                assert::seat_map(&seat_query, &seat_map),
            )
            .await?;
        }

        Ok(())
    }

    /// Books some seats, then asks for the very same seats again from several concurrent
    /// requests. Every one of them must be refused.
    pub(crate) async fn attack_reserve_for_reserved(&self) -> Result<(), Stop> {
        let user = self.sign_up().await?;
        self.check_stations().await?;
        let Some(booking) = self.book(&user, None).await? else {
            return Ok(());
        };

        let kind = EndpointKind::Reserve;
        let attempts = (0..REBOOK_ATTEMPTS)
            .map(|_| step(kind, self.client.reserve(&booking.request)));

        let mut stop = None;
        for attempt in join_all(attempts).await {
            let res = match attempt {
                Ok(resp) => {
                    let err = BenchError::critical(format!(
                        "reservation {} was accepted for seats already held by reservation {}",
                        resp.reservation_id, booking.id
                    ));
                    Err(self.fail(kind, err).await)
                }
                Err(StepError::Client(err)) if refused(&err) => {
                    self.succeed(kind).await;
                    Ok(())
                }
                Err(StepError::Deadline) => Err(Stop::Deadline),
                Err(StepError::Client(err)) => {
                    Err(self.fail(kind, BenchError::from_client(kind, err)).await)
                }
            };
            if let Err(res) = res {
                stop.get_or_insert(res);
            }
        }

        stop.map_or(Ok(()), Err)
    }

    /// Books as one user, then signs in as another and tries to cancel that booking.
    pub(crate) async fn attack_reserve_for_other_reservation(&self) -> Result<(), Stop> {
        let owner = self.sign_up().await?;
        let Some(booking) = self.book(&owner, None).await? else {
            return Ok(());
        };
        self.call(EndpointKind::Logout, self.client.logout())
            .await?;
        self.sign_up().await?;

        let kind = EndpointKind::CancelReservation;
        match step(kind, self.client.cancel_reservation(booking.id)).await {
            Ok(()) => {
                // The service no longer holds it either.
                if let Err(err) = self.ledger.cancel(booking.id) {
                    error!("Could not drop reservation {}: {err}", booking.id);
                }
                let err = BenchError::critical(format!(
                    "reservation {} of {} was cancelled by another user",
                    booking.id, owner.email
                ));
                Err(self.fail(kind, err).await)
            }
            Err(StepError::Client(err)) if refused(&err) => {
                debug!("Cancellation by a stranger was refused: {err}");
                self.succeed(kind).await;
                Ok(())
            }
            Err(StepError::Deadline) => Err(Stop::Deadline),
            Err(StepError::Client(err)) => {
                Err(self.fail(kind, BenchError::from_client(kind, err)).await)
            }
        }
    }
}

/// Any 4xx answer counts as the service turning the request away.
fn refused(err: &ClientError) -> bool {
    err.status().is_some_and(|status| (400..500).contains(&status))
}
