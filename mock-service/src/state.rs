//! In-memory state of the mock reservation and payment services.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use time::Date;
use tracing::debug;
use trainbench_core::fare::{self, SeatClass, TrainClass};
use trainbench_core::{
    seat, section::Section, topology, CardInformation, CoreError, InitializeResponse,
    PaymentRecord, PaymentSettlement, ReservationId, ReservationRequest, ReservationSummary,
    ReserveResponse, Seat, SeatMap, SeatQuery, SeatStatus, StationInfo, TrainSearchQuery,
    TrainSummary, TravelWindow, User, MAX_RESERVATION_DAYS,
};

/// Trains of each class per direction and day.
const TRAINS_PER_CLASS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service is over capacity")]
    Unavailable,
}

impl ServiceError {
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::NotFound => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Unavailable => 503,
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Card registry and charges of the payment stub.
#[derive(Default)]
pub struct PaymentState {
    inner: Mutex<PaymentInner>,
}

#[derive(Default)]
struct PaymentInner {
    cards: HashMap<String, CardInformation>,
    charges: Vec<PaymentRecord>,
    next_token: u64,
}

impl PaymentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&self) {
        *lock(&self.inner) = PaymentInner::default();
    }

    pub fn register_card(&self, card: CardInformation) -> Result<String, ServiceError> {
        let valid = card.card_number.len() == 16
            && card.card_number.chars().all(|c| c.is_ascii_digit())
            && card.cvv.len() == 3;
        if !valid {
            return Err(ServiceError::BadRequest("invalid card".into()));
        }

        let mut inner = lock(&self.inner);
        inner.next_token += 1;
        let token = format!("tok-{:08}", inner.next_token);
        inner.cards.insert(token.clone(), card);
        Ok(token)
    }

    pub fn charge(
        &self,
        card_token: &str,
        reservation_id: ReservationId,
        amount: u64,
    ) -> Result<(), ServiceError> {
        let mut inner = lock(&self.inner);
        if !inner.cards.contains_key(card_token) {
            return Err(ServiceError::BadRequest(format!(
                "unknown card token {card_token}"
            )));
        }
        inner.charges.push(PaymentRecord {
            card_token: card_token.to_string(),
            reservation_id,
            amount,
            is_canceled: false,
        });
        Ok(())
    }

    pub fn cancel_charge(&self, reservation_id: ReservationId) {
        let mut inner = lock(&self.inner);
        for charge in inner
            .charges
            .iter_mut()
            .filter(|c| c.reservation_id == reservation_id)
        {
            charge.is_canceled = true;
        }
    }

    pub fn settlement(&self) -> PaymentSettlement {
        PaymentSettlement {
            records: lock(&self.inner).charges.clone(),
        }
    }
}

struct Stored {
    email: String,
    request: ReservationRequest,
    amount: u64,
    committed: bool,
}

impl Stored {
    fn summary(&self, id: ReservationId) -> ReservationSummary {
        let req = &self.request;
        ReservationSummary {
            reservation_id: id,
            date: req.date,
            train_class: req.train_class,
            train_name: req.train_name.clone(),
            car_number: req.car_number,
            seat_class: req.seat_class,
            origin: req.origin.clone(),
            destination: req.destination.clone(),
            adults: req.adults,
            children: req.children,
            amount: self.amount,
            seats: req.seats.clone(),
        }
    }
}

struct ServiceInner {
    window: TravelWindow,
    users: HashMap<String, String>,
    reservations: BTreeMap<ReservationId, Stored>,
    next_id: ReservationId,
}

impl ServiceInner {
    fn new(window: TravelWindow) -> Self {
        Self {
            window,
            users: HashMap::new(),
            reservations: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn taken(
        &self,
        date: Date,
        train_name: &str,
        car_number: u8,
        origin: &str,
        destination: &str,
    ) -> Result<Vec<Seat>, ServiceError> {
        let wanted = Section::new(origin, destination);
        let mut seats = Vec::new();
        for stored in self.reservations.values() {
            let req = &stored.request;
            if req.date != date || req.train_name != train_name || req.car_number != car_number {
                continue;
            }
            if wanted.conflicts_with(&req.section())? {
                seats.extend(req.seats.iter().cloned());
            }
        }
        Ok(seats)
    }
}

/// Reservation service backing the mock HTTP routes.
///
/// Every operation is synchronous and takes the state lock for its whole duration, so seat
/// conflicts are detected atomically.
pub struct ServiceState {
    inner: Mutex<ServiceInner>,
    available_days: u16,
    payment: Arc<PaymentState>,
}

impl ServiceState {
    pub fn new(payment: Arc<PaymentState>) -> Self {
        Self::with_available_days(payment, MAX_RESERVATION_DAYS)
    }

    /// A service announcing a travel window of `days` days. Out of range values are clamped.
    pub fn with_available_days(payment: Arc<PaymentState>, days: u16) -> Self {
        let days = days.clamp(1, MAX_RESERVATION_DAYS);
        let window = TravelWindow::new(days).unwrap_or_default();
        Self {
            inner: Mutex::new(ServiceInner::new(window)),
            available_days: window.days,
            payment,
        }
    }

    pub fn payment(&self) -> &Arc<PaymentState> {
        &self.payment
    }

    pub fn initialize(&self) -> InitializeResponse {
        let mut inner = lock(&self.inner);
        *inner = ServiceInner::new(inner.window);
        debug!("Service state reset");
        InitializeResponse {
            available_days: self.available_days,
            language: "rust".to_string(),
        }
    }

    pub fn register(&self, user: &User) -> Result<(), ServiceError> {
        if user.email.is_empty() || user.password.is_empty() {
            return Err(ServiceError::BadRequest("email and password are required".into()));
        }
        let mut inner = lock(&self.inner);
        if inner.users.contains_key(&user.email) {
            return Err(ServiceError::Conflict(format!("{} is taken", user.email)));
        }
        inner.users.insert(user.email.clone(), user.password.clone());
        Ok(())
    }

    pub fn login(&self, user: &User) -> Result<(), ServiceError> {
        match lock(&self.inner).users.get(&user.email) {
            Some(password) if *password == user.password => Ok(()),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    pub fn stations(&self) -> Vec<StationInfo> {
        topology::stations()
            .iter()
            .map(|s| StationInfo {
                id: s.position,
                name: s.name.to_string(),
                distance: s.distance,
                is_stop_express: s.stops.express,
                is_stop_semi_express: s.stops.semi_express,
                is_stop_local: s.stops.local,
            })
            .collect()
    }

    pub fn search_trains(&self, query: &TrainSearchQuery) -> Result<Vec<TrainSummary>, ServiceError> {
        self.check_date(query.date)?;
        let origin = topology::lookup(&query.origin)?;
        let destination = topology::lookup(&query.destination)?;
        if origin.position == destination.position {
            return Err(ServiceError::BadRequest("origin equals destination".into()));
        }
        let downbound = origin.position < destination.position;
        let (first, last) = if downbound {
            ("Tokyo", "Osaka")
        } else {
            ("Osaka", "Tokyo")
        };

        let classes = match query.train_class {
            Some(class) => vec![class],
            None => TrainClass::ALL.to_vec(),
        };

        let mut trains = Vec::new();
        for class in classes {
            if !origin.stops.serves(class) || !destination.stops.serves(class) {
                continue;
            }

            let mut fares = HashMap::new();
            for seat_class in [SeatClass::Premium, SeatClass::Reserved, SeatClass::NonReserved] {
                let fare = fare::fare(origin.name, destination.name, class, seat_class, query.date)?;
                fares.insert(seat_class, fare);
            }

            for idx in 0..TRAINS_PER_CLASS {
                trains.push(TrainSummary {
                    train_class: class,
                    train_name: train_name(class, downbound, idx),
                    origin: first.to_string(),
                    destination: last.to_string(),
                    fares: fares.clone(),
                });
            }
        }
        Ok(trains)
    }

    pub fn seat_map(&self, query: &SeatQuery) -> Result<SeatMap, ServiceError> {
        self.check_date(query.date)?;
        let seat_class = seat::seat_class_for(query.train_class, query.car_number)?;

        let inner = lock(&self.inner);
        let taken = inner.taken(
            query.date,
            &query.train_name,
            query.car_number,
            &query.origin,
            &query.destination,
        )?;

        let seats = car_layout(seat_class)
            .into_iter()
            .map(|seat| SeatStatus {
                is_occupied: taken.contains(&seat),
                row: seat.row,
                column: seat.column,
                seat_class,
            })
            .collect();

        Ok(SeatMap {
            date: query.date,
            train_class: query.train_class,
            train_name: query.train_name.clone(),
            car_number: query.car_number,
            seats,
        })
    }

    pub fn reserve(
        &self,
        email: &str,
        request: &ReservationRequest,
    ) -> Result<ReserveResponse, ServiceError> {
        self.check_date(request.date)?;
        if request.seats.is_empty() || request.adults + request.children == 0 {
            return Err(ServiceError::BadRequest("no seats requested".into()));
        }
        let seat_class = seat::seat_class_for(request.train_class, request.car_number)?;
        if seat_class != request.seat_class {
            return Err(ServiceError::BadRequest(format!(
                "car {} has no {} seats",
                request.car_number, request.seat_class
            )));
        }
        let layout = car_layout(seat_class);
        if let Some(seat) = request.seats.iter().find(|s| !layout.contains(s)) {
            return Err(ServiceError::BadRequest(format!("no such seat {seat}")));
        }
        let amount = fare::amount(request)?;

        let mut inner = lock(&self.inner);
        let taken = inner.taken(
            request.date,
            &request.train_name,
            request.car_number,
            &request.origin,
            &request.destination,
        )?;
        if let Some(seat) = request.seats.iter().find(|s| taken.contains(s)) {
            return Err(ServiceError::Conflict(format!("seat {seat} is already taken")));
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.reservations.insert(
            id,
            Stored {
                email: email.to_string(),
                request: request.clone(),
                amount,
                committed: false,
            },
        );
        Ok(ReserveResponse {
            reservation_id: id,
            amount,
        })
    }

    pub fn commit(
        &self,
        email: &str,
        id: ReservationId,
        card_token: &str,
    ) -> Result<(), ServiceError> {
        let mut inner = lock(&self.inner);
        let stored = inner
            .reservations
            .get_mut(&id)
            .filter(|s| s.email == email)
            .ok_or(ServiceError::NotFound)?;
        if stored.committed {
            return Err(ServiceError::Conflict(format!("reservation {id} is already paid")));
        }

        self.payment.charge(card_token, id, stored.amount)?;
        stored.committed = true;
        Ok(())
    }

    pub fn cancel(&self, email: &str, id: ReservationId) -> Result<(), ServiceError> {
        let mut inner = lock(&self.inner);
        match inner.reservations.get(&id) {
            Some(stored) if stored.email == email => {}
            _ => return Err(ServiceError::NotFound),
        }
        if let Some(stored) = inner.reservations.remove(&id) {
            if stored.committed {
                self.payment.cancel_charge(id);
            }
        }
        Ok(())
    }

    pub fn reservations(&self, email: &str) -> Vec<ReservationSummary> {
        lock(&self.inner)
            .reservations
            .iter()
            .filter(|(_, s)| s.email == email)
            .map(|(id, s)| s.summary(*id))
            .collect()
    }

    pub fn reservation(
        &self,
        email: &str,
        id: ReservationId,
    ) -> Result<ReservationSummary, ServiceError> {
        lock(&self.inner)
            .reservations
            .get(&id)
            .filter(|s| s.email == email)
            .map(|s| s.summary(id))
            .ok_or(ServiceError::NotFound)
    }

    fn check_date(&self, date: Date) -> Result<(), ServiceError> {
        let window = lock(&self.inner).window;
        if !window.contains(date) {
            return Err(ServiceError::BadRequest(format!(
                "{date} is outside the reservation window"
            )));
        }
        Ok(())
    }
}

fn train_name(class: TrainClass, downbound: bool, idx: u32) -> String {
    let base = match class {
        TrainClass::Fastest => 1,
        TrainClass::Mid => 101,
        TrainClass::Slow => 301,
    };
    // Odd numbers run downbound, even numbers upbound.
    let number = base + idx * 2 + u32::from(!downbound);
    number.to_string()
}

/// Seats of a car. Premium cars have four seats per row, the others five.
fn car_layout(seat_class: SeatClass) -> Vec<Seat> {
    let (rows, columns): (u32, &[&str]) = match seat_class {
        SeatClass::Premium => (10, &["A", "B", "C", "D"]),
        _ => (15, &["A", "B", "C", "D", "E"]),
    };
    (1..=rows)
        .flat_map(|row| columns.iter().map(move |column| Seat::new(row, column)))
        .collect()
}
