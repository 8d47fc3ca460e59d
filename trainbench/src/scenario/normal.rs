use super::{assert, Booking, Journey, Stop};
use crate::client::{PaymentClient, SutClient};
use crate::error::BenchError;
use crate::transaction::{call, step, StepError};
use std::collections::BTreeMap;
use time::Date;
use tracing::{debug, error, instrument};
use trainbench_core::{
    fare, seat, EndpointKind, ReservationRequest, Seat, SeatMap, SeatQuery, TrainSearchQuery,
    User,
};

/// Season multiplier of the peak windows booked by the season journey.
const PEAK_SEASON: f64 = 5.0;

impl<C, P> Journey<C, P>
where
    C: SutClient + Send + Sync + 'static,
    P: PaymentClient + Send + Sync + 'static,
{
    #[instrument(skip(self))]
    pub(crate) async fn normal(&self, cancel: bool, date: Option<Date>) -> Result<(), Stop> {
        let user = self.sign_up().await?;
        self.check_stations().await?;

        let Some(booking) = self.book(&user, date).await? else {
            return Ok(());
        };
        self.pay(&booking).await?;
        self.verify_booking(&booking).await?;

        if cancel {
            self.cancel(&booking).await?;
        }
        self.call(EndpointKind::Logout, self.client.logout()).await?;
        Ok(())
    }

    /// Books on the first peak-season day of the travel window, if there is one.
    pub(crate) async fn season(&self) -> Result<(), Stop> {
        let peak = (0..self.window.days)
            .map(|offset| self.window.day(offset))
            .find(|date| fare::season_multiplier(*date) == Some(PEAK_SEASON));

        match peak {
            Some(date) => self.normal(false, Some(date)).await,
            None => {
                debug!("No peak season day in the travel window");
                Ok(())
            }
        }
    }

    pub(crate) async fn sign_up(&self) -> Result<User, Stop> {
        let user = self.data.user();
        self.call(EndpointKind::Register, self.client.register(&user))
            .await?;
        self.call(EndpointKind::Login, self.client.login(&user))
            .await?;
        Ok(user)
    }

    pub(super) async fn check_stations(&self) -> Result<(), Stop> {
        let stations = self
            .fetch(EndpointKind::ListStations, self.client.list_stations())
            .await?;
        self.check(EndpointKind::ListStations, assert::stations(&stations))
            .await
    }

    /// Searches, picks seats and reserves them. `None` when nothing suitable was free.
    pub(super) async fn book(
        &self,
        user: &User,
        date: Option<Date>,
    ) -> Result<Option<Booking>, Stop> {
        let (origin, destination) = self.data.section();
        let date = date.unwrap_or_else(|| self.window.day(self.data.day_offset(self.window.days)));
        let (adults, children) = self.data.passengers();

        let query = TrainSearchQuery {
            date,
            origin: origin.clone(),
            destination: destination.clone(),
            train_class: Some(self.data.train_class()),
            adults,
            children,
        };
        let trains = self
            .fetch(EndpointKind::SearchTrains, self.client.search_trains(&query))
            .await?;
        self.check(EndpointKind::SearchTrains, assert::trains(&query, &trains))
            .await?;
        let train = &trains[self.data.pick(trains.len())];

        let seat_class = self.data.seat_class();
        let cars = seat::cars_with(train.train_class, seat_class);
        if cars.is_empty() {
            return Ok(None);
        }
        let seat_query = SeatQuery {
            date,
            train_class: train.train_class,
            train_name: train.train_name.clone(),
            car_number: cars[self.data.pick(cars.len())],
            origin,
            destination,
        };
        let seat_map = self.list_seats(&seat_query).await?;

        let Some(seats) = choose_seats(&seat_map, (adults + children) as usize) else {
            debug!(
                "Car {} of train {} is full",
                seat_query.car_number, seat_query.train_name
            );
            return Ok(None);
        };

        let request = ReservationRequest {
            date,
            origin: seat_query.origin,
            destination: seat_query.destination,
            train_class: seat_query.train_class,
            train_name: seat_query.train_name,
            car_number: seat_query.car_number,
            seat_class,
            seats,
            adults,
            children,
        };
        self.reserve(user, request).await
    }

    async fn list_seats(&self, query: &SeatQuery) -> Result<SeatMap, Stop> {
        let seat_map = self
            .fetch(EndpointKind::ListSeats, self.client.list_seats(query))
            .await?;
        self.check(EndpointKind::ListSeats, assert::seat_map(query, &seat_map))
            .await?;
        Ok(seat_map)
    }

    /// Books `request`, cross-checking the service's decision against the ledger.
    async fn reserve(
        &self,
        user: &User,
        request: ReservationRequest,
    ) -> Result<Option<Booking>, Stop> {
        let kind = EndpointKind::Reserve;

        let expected = match fare::amount(&request) {
            Ok(amount) => amount,
            Err(err) => return Err(self.fail(kind, err.into()).await),
        };
        let admissible = match self.ledger.can_reserve(&request) {
            Ok(admissible) => admissible,
            Err(err) => return Err(self.fail(kind, err.into()).await),
        };

        let resp = match step(kind, self.client.reserve(&request)).await {
            Ok(resp) => resp,
            Err(StepError::Deadline) => return Err(Stop::Deadline),
            Err(StepError::Client(err)) if err.status() == Some(409) => {
                return self.rejected(&request).await.map(|_| None);
            }
            Err(StepError::Client(err)) => {
                return Err(self.fail(kind, BenchError::from_client(kind, err)).await)
            }
        };

        // The conflicting booking may have been cancelled while this request was in flight.
        let admissible = if admissible {
            true
        } else {
            match self.ledger.can_reserve(&request) {
                Ok(admissible) => admissible,
                Err(err) => return Err(self.fail(kind, err.into()).await),
            }
        };
        if !admissible {
            let seats: Vec<_> = request.seats.iter().map(Seat::to_string).collect();
            return Err(self
                .fail(
                    kind,
                    BenchError::critical(format!(
                        "reservation {} was accepted although seats {} in car {} of train {} are already booked",
                        resp.reservation_id,
                        seats.join(","),
                        request.car_number,
                        request.train_name
                    )),
                )
                .await);
        }
        if let Err(err) = assert::reserved(&resp, expected) {
            return Err(self.fail(kind, err).await);
        }
        let amount = match self.ledger.add(user, &request, resp.reservation_id) {
            Ok(amount) => amount,
            Err(err) => return Err(self.fail(kind, err.into()).await),
        };
        self.succeed(kind).await;

        if request.seat_class != fare::SeatClass::NonReserved {
            self.extra(kind, self.score.reserved_seat_extra_score).await;
        }
        let bonus = seat::neighbor_seats_bonus(&request.seats);
        self.extra(kind, (bonus * 10.) as u64).await;

        Ok(Some(Booking {
            user: user.clone(),
            request,
            id: resp.reservation_id,
            amount,
        }))
    }

    /// Decides whether a conflict response is justified by a booking made in the meantime.
    async fn rejected(&self, request: &ReservationRequest) -> Result<(), Stop> {
        let kind = EndpointKind::Reserve;
        match self.ledger.can_reserve(request) {
            Ok(false) => {
                debug!("Reservation lost a race to a concurrent booking");
                return Ok(());
            }
            Ok(true) => {}
            Err(err) => return Err(self.fail(kind, err.into()).await),
        }

        let query = SeatQuery {
            date: request.date,
            train_class: request.train_class,
            train_name: request.train_name.clone(),
            car_number: request.car_number,
            origin: request.origin.clone(),
            destination: request.destination.clone(),
        };
        let seat_map = self.list_seats(&query).await?;
        let taken = seat_map
            .seats
            .iter()
            .any(|s| s.is_occupied && request.seats.contains(&s.seat()));

        if taken {
            debug!("Seats were taken by a booking not yet in the ledger");
            Ok(())
        } else {
            let err = BenchError::application(format!(
                "reservation on train {} car {} was refused although its seats are free",
                request.train_name, request.car_number
            ));
            Err(self.fail(kind, err).await)
        }
    }

    async fn pay(&self, booking: &Booking) -> Result<(), Stop> {
        let kind = EndpointKind::CommitReservation;
        let card = self.data.card();
        let token = match call(self.payment.register_card(&card)).await {
            Ok(token) => token,
            Err(StepError::Deadline) => return Err(Stop::Deadline),
            Err(StepError::Client(err)) => {
                let err = BenchError::new(err.severity(), format!("card registration: {err}"));
                return Err(self.fail(kind, err).await);
            }
        };

        self.fetch(kind, self.client.commit_reservation(booking.id, &token))
            .await?;
        if let Err(err) = self.ledger.commit(booking.id) {
            return Err(self.fail(kind, err.into()).await);
        }
        self.succeed(kind).await;
        Ok(())
    }

    async fn verify_booking(&self, booking: &Booking) -> Result<(), Stop> {
        let list = self
            .fetch(
                EndpointKind::ListReservations,
                self.client.list_reservations(),
            )
            .await?;
        self.check(EndpointKind::ListReservations, assert::listed(&list, booking))
            .await?;

        let shown = self
            .fetch(
                EndpointKind::ShowReservation,
                self.client.show_reservation(booking.id),
            )
            .await?;
        self.check(EndpointKind::ShowReservation, assert::summary(&shown, booking))
            .await
    }

    async fn cancel(&self, booking: &Booking) -> Result<(), Stop> {
        // Leave the ledger first so concurrent admission checks never see a seat as taken
        // after the service has released it.
        let record = match self.ledger.cancel(booking.id) {
            Ok(record) => record,
            Err(err) => return Err(self.fail(EndpointKind::CancelReservation, err.into()).await),
        };
        let cancelled = self
            .call(
                EndpointKind::CancelReservation,
                self.client.cancel_reservation(booking.id),
            )
            .await;
        if let Err(stop) = cancelled {
            if let Err(err) = self.ledger.restore(record) {
                error!("Could not restore reservation {}: {err}", booking.id);
            }
            return Err(stop);
        }

        let list = self
            .fetch(
                EndpointKind::ListReservations,
                self.client.list_reservations(),
            )
            .await?;
        self.check(
            EndpointKind::ListReservations,
            assert::not_listed(&list, booking.id),
        )
        .await?;

        let kind = EndpointKind::ShowReservation;
        match step(kind, self.client.show_reservation(booking.id)).await {
            Ok(_) => {
                let err = BenchError::application(format!(
                    "cancelled reservation {} can still be shown",
                    booking.id
                ));
                Err(self.fail(kind, err).await)
            }
            Err(StepError::Client(err)) if err.status() == Some(404) => {
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

/// Picks `count` free seats, preferring a single row so the party sits together.
fn choose_seats(map: &SeatMap, count: usize) -> Option<Vec<Seat>> {
    if count == 0 {
        return None;
    }

    let mut rows: BTreeMap<u32, Vec<Seat>> = BTreeMap::new();
    for status in map.seats.iter().filter(|s| !s.is_occupied) {
        rows.entry(status.row).or_default().push(status.seat());
    }

    if let Some(row) = rows.values().find(|row| row.len() >= count) {
        return Some(row[..count].to_vec());
    }

    let free: Vec<_> = rows.into_values().flatten().take(count).collect();
    (free.len() == count).then_some(free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use trainbench_core::fare::{SeatClass, TrainClass};
    use trainbench_core::SeatStatus;

    fn map(seats: &[(u32, &str, bool)]) -> SeatMap {
        SeatMap {
            date: date!(2020 - 03 - 01),
            train_class: TrainClass::Slow,
            train_name: "3".into(),
            car_number: 1,
            seats: seats
                .iter()
                .map(|(row, column, is_occupied)| SeatStatus {
                    row: *row,
                    column: column.to_string(),
                    seat_class: SeatClass::NonReserved,
                    is_occupied: *is_occupied,
                })
                .collect(),
        }
    }

    #[test]
    fn prefers_one_row() {
        let seats = map(&[
            (1, "A", true),
            (1, "B", false),
            (2, "A", false),
            (2, "B", false),
            (2, "C", false),
        ]);
        assert_eq!(
            choose_seats(&seats, 2).unwrap(),
            vec![Seat::new(2, "A"), Seat::new(2, "B")]
        );
    }

    #[test]
    fn spreads_when_no_row_fits() {
        let seats = map(&[(1, "A", false), (2, "A", false), (3, "A", true)]);
        assert_eq!(
            choose_seats(&seats, 2).unwrap(),
            vec![Seat::new(1, "A"), Seat::new(2, "A")]
        );
        assert_eq!(choose_seats(&seats, 3), None);
        assert_eq!(choose_seats(&seats, 0), None);
    }
}
