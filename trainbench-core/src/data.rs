use crate::fare::{SeatClass, TrainClass};
use crate::section::Section;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::Date;

/// Reservation identifiers are assigned by the service under test.
pub type ReservationId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Seat {
    pub row: u32,
    pub column: String,
}

impl Seat {
    pub fn new(row: u32, column: &str) -> Self {
        Self {
            row,
            column: column.to_string(),
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub password: String,
}

impl User {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub date: Date,
    pub origin: String,
    pub destination: String,
    pub train_class: TrainClass,
    pub train_name: String,
    pub car_number: u8,
    pub seat_class: SeatClass,
    pub seats: Vec<Seat>,
    pub adults: u32,
    pub children: u32,
}

impl ReservationRequest {
    pub fn section(&self) -> Section<'_> {
        Section::new(&self.origin, &self.destination)
    }

    /// True if both requests ride the same scheduled train on the same day.
    pub fn same_train(&self, other: &ReservationRequest) -> bool {
        self.date == other.date
            && self.train_class == other.train_class
            && self.train_name == other.train_name
    }

    pub fn shares_seat_with(&self, other: &ReservationRequest) -> bool {
        self.car_number == other.car_number
            && self.seats.iter().any(|seat| other.seats.contains(seat))
    }
}

/// A reservation the harness believes the service holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: ReservationId,
    pub user: User,
    #[serde(flatten)]
    pub request: ReservationRequest,
    /// Expected charge, unset when the fare could not be computed.
    #[serde(default)]
    pub amount: Option<u64>,
    pub committed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub available_days: u16,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub id: u32,
    pub name: String,
    pub distance: f64,
    pub is_stop_express: bool,
    pub is_stop_semi_express: bool,
    pub is_stop_local: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSearchQuery {
    pub date: Date,
    pub origin: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_class: Option<TrainClass>,
    pub adults: u32,
    pub children: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    pub train_class: TrainClass,
    pub train_name: String,
    pub origin: String,
    pub destination: String,
    pub fares: HashMap<SeatClass, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatQuery {
    pub date: Date,
    pub train_class: TrainClass,
    pub train_name: String,
    pub car_number: u8,
    pub origin: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatStatus {
    pub row: u32,
    pub column: String,
    pub seat_class: SeatClass,
    pub is_occupied: bool,
}

impl SeatStatus {
    pub fn seat(&self) -> Seat {
        Seat::new(self.row, &self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatMap {
    pub date: Date,
    pub train_class: TrainClass,
    pub train_name: String,
    pub car_number: u8,
    pub seats: Vec<SeatStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveResponse {
    pub reservation_id: ReservationId,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub reservation_id: ReservationId,
    pub card_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationSummary {
    pub reservation_id: ReservationId,
    pub date: Date,
    pub train_class: TrainClass,
    pub train_name: String,
    pub car_number: u8,
    pub seat_class: SeatClass,
    pub origin: String,
    pub destination: String,
    pub adults: u32,
    pub children: u32,
    pub amount: u64,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInformation {
    pub card_number: String,
    pub cvv: String,
    pub expiry_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardToken {
    pub card_token: String,
}

/// A charge recorded by the payment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub card_token: String,
    pub reservation_id: ReservationId,
    pub amount: u64,
    pub is_canceled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub records: Vec<PaymentRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn request(seats: &[(u32, &str)]) -> ReservationRequest {
        ReservationRequest {
            date: date!(2020 - 03 - 10),
            origin: "Tokyo".to_string(),
            destination: "Nagoya".to_string(),
            train_class: TrainClass::Mid,
            train_name: "1001".to_string(),
            car_number: 6,
            seat_class: SeatClass::Reserved,
            seats: seats.iter().map(|(r, c)| Seat::new(*r, c)).collect(),
            adults: 1,
            children: 0,
        }
    }

    #[test]
    fn shared_seats() {
        let a = request(&[(1, "A"), (1, "B")]);
        let mut b = request(&[(1, "B")]);
        assert!(a.same_train(&b));
        assert!(a.shares_seat_with(&b));

        b.car_number = 7;
        assert!(!a.shares_seat_with(&b));
    }

    #[test]
    fn record_json() {
        let record = ReservationRecord {
            id: 7,
            user: User::new("a@example.com", "pw"),
            request: request(&[(2, "C")]),
            amount: Some(12500),
            committed: false,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2020-03-10");
        assert_eq!(json["seat_class"], "reserved");
        assert_eq!(json["train_class"], "mid");

        let back: ReservationRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, record);

        let mut unpriced = json;
        unpriced.as_object_mut().unwrap().remove("amount");
        let back: ReservationRecord = serde_json::from_value(unpriced).unwrap();
        assert_eq!(back.amount, None);
    }

    #[test]
    fn seat_display() {
        assert_eq!(Seat::new(12, "D").to_string(), "12D");
    }
}
