//! Fare engine.
//!
//! A booking is priced as `round(distance fare * class multiplier * season multiplier)` per
//! adult, with children paying half of that (truncated).
use crate::{topology, CoreError, ReservationRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{macros::date, Date};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainClass {
    Fastest,
    Mid,
    Slow,
}

impl TrainClass {
    pub const ALL: [TrainClass; 3] = [TrainClass::Fastest, TrainClass::Mid, TrainClass::Slow];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainClass::Fastest => "fastest",
            TrainClass::Mid => "mid",
            TrainClass::Slow => "slow",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            TrainClass::Fastest => 1.5,
            TrainClass::Mid => 1.0,
            TrainClass::Slow => 0.8,
        }
    }
}

impl fmt::Display for TrainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrainClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fastest" => Ok(TrainClass::Fastest),
            "mid" => Ok(TrainClass::Mid),
            "slow" => Ok(TrainClass::Slow),
            other => Err(CoreError::UnknownTrainClass(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatClass {
    Premium,
    Reserved,
    #[serde(alias = "non_reserved")]
    NonReserved,
}

impl SeatClass {
    pub const ALL: [SeatClass; 3] = [
        SeatClass::Premium,
        SeatClass::Reserved,
        SeatClass::NonReserved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::Premium => "premium",
            SeatClass::Reserved => "reserved",
            SeatClass::NonReserved => "non-reserved",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            SeatClass::Premium => 2.0,
            SeatClass::Reserved => 1.25,
            SeatClass::NonReserved => 1.0,
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SeatClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "premium" => Ok(SeatClass::Premium),
            "reserved" => Ok(SeatClass::Reserved),
            "non-reserved" | "non_reserved" => Ok(SeatClass::NonReserved),
            other => Err(CoreError::UnknownSeatClass(other.to_string())),
        }
    }
}

/// Fare seasons as `(first day, multiplier)`. Each season lasts until the next one starts.
const SEASONS: [(Date, f64); 9] = [
    (date!(2020 - 01 - 01), 5.0),
    (date!(2020 - 01 - 06), 1.0),
    (date!(2020 - 03 - 13), 3.0),
    (date!(2020 - 04 - 01), 1.0),
    (date!(2020 - 04 - 24), 5.0),
    (date!(2020 - 05 - 11), 1.0),
    (date!(2020 - 08 - 07), 3.0),
    (date!(2020 - 08 - 24), 1.0),
    (date!(2020 - 12 - 25), 5.0),
];

/// First day after the last season.
const SEASONS_END: Date = date!(2021 - 01 - 01);

const DISTANCE_TIERS: [(f64, f64, u64); 9] = [
    (0., 50., 2500),
    (50., 75., 3000),
    (75., 100., 3700),
    (100., 150., 4500),
    (150., 200., 5200),
    (200., 300., 6000),
    (300., 400., 7200),
    (400., 500., 8300),
    (500., 1000., 12000),
];

const LONG_DISTANCE_FARE: u64 = 20000;
const LONG_DISTANCE: f64 = 1000.;

/// Maps a raw distance onto its fare tier. Tier bounds are exclusive.
pub fn tier_fare(distance: f64) -> Result<u64, CoreError> {
    if distance > LONG_DISTANCE {
        return Ok(LONG_DISTANCE_FARE);
    }

    DISTANCE_TIERS
        .iter()
        .find(|(low, high, _)| distance > *low && distance < *high)
        .map(|(_, _, fare)| *fare)
        .ok_or(CoreError::InvalidDistance(distance))
}

pub fn distance_fare(from: &str, to: &str) -> Result<u64, CoreError> {
    tier_fare(topology::distance_between(from, to)?)
}

pub fn season_multiplier(date: Date) -> Option<f64> {
    SEASONS.iter().enumerate().find_map(|(idx, (start, multiplier))| {
        let end = SEASONS.get(idx + 1).map(|s| s.0).unwrap_or(SEASONS_END);
        (*start <= date && date < end).then_some(*multiplier)
    })
}

pub fn class_multiplier(train_class: TrainClass, seat_class: SeatClass) -> f64 {
    train_class.multiplier() * seat_class.multiplier()
}

/// Class multiplier times season multiplier. Dates outside every season yield `0.0`.
pub fn class_season_multiplier(train_class: TrainClass, seat_class: SeatClass, date: Date) -> f64 {
    match season_multiplier(date) {
        Some(season) => class_multiplier(train_class, seat_class) * season,
        None => {
            warn!("No fare season covers {date}, fare multiplier is 0");
            0.
        }
    }
}

/// Per-adult fare for one section, class and date.
pub fn fare(
    from: &str,
    to: &str,
    train_class: TrainClass,
    seat_class: SeatClass,
    date: Date,
) -> Result<u64, CoreError> {
    let base = distance_fare(from, to)?;
    let multiplier = class_season_multiplier(train_class, seat_class, date);
    if multiplier <= 0. {
        return Err(CoreError::OutOfSeason(date));
    }

    Ok((base as f64 * multiplier).round() as u64)
}

pub fn total_amount(fare: u64, adults: u32, children: u32) -> u64 {
    fare * adults as u64 + (fare * children as u64) / 2
}

/// Amount the service is expected to charge for a booking request.
pub fn amount(req: &ReservationRequest) -> Result<u64, CoreError> {
    let fare = fare(
        &req.origin,
        &req.destination,
        req.train_class,
        req.seat_class,
        req.date,
    )?;
    Ok(total_amount(fare, req.adults, req.children))
}
