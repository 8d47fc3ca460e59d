//! Checks on service responses against the harness's own model.
use super::Booking;
use crate::error::BenchError;
use std::collections::HashSet;
use trainbench_core::{
    fare, seat, section, topology, ReservationId, ReservationSummary, ReserveResponse, SeatMap,
    SeatQuery, StationInfo, TrainSearchQuery, TrainSummary,
};

pub(crate) fn stations(list: &[StationInfo]) -> Result<(), BenchError> {
    let want = topology::stations();
    if list.len() != want.len() {
        return Err(BenchError::application(format!(
            "station list has {} stations, expected {}",
            list.len(),
            want.len()
        )));
    }

    for (got, want) in list.iter().zip(want) {
        if got.name != want.name {
            return Err(BenchError::application(format!(
                "station list is out of order: found {} where {} was expected",
                got.name, want.name
            )));
        }
        let stops = (got.is_stop_express, got.is_stop_semi_express, got.is_stop_local);
        if stops != (want.stops.express, want.stops.semi_express, want.stops.local) {
            return Err(BenchError::application(format!(
                "station {} has wrong stop flags",
                got.name
            )));
        }
    }

    Ok(())
}

pub(crate) fn trains(query: &TrainSearchQuery, trains: &[TrainSummary]) -> Result<(), BenchError> {
    if trains.is_empty() {
        return Err(BenchError::application(format!(
            "no trains found from {} to {} on {}",
            query.origin, query.destination, query.date
        )));
    }

    let wanted = section::direction(&query.origin, &query.destination)?;
    let (from, to) = (
        topology::position(&query.origin)?,
        topology::position(&query.destination)?,
    );

    for train in trains {
        if !topology::is_known(&train.origin) || !topology::is_known(&train.destination) {
            return Err(BenchError::critical(format!(
                "train {} runs between unknown stations {} and {}",
                train.train_name, train.origin, train.destination
            )));
        }
        if let Some(class) = query.train_class {
            if train.train_class != class {
                return Err(BenchError::application(format!(
                    "searched for {class} trains but got {} train {}",
                    train.train_class, train.train_name
                )));
            }
        }

        let start = topology::position(&train.origin)?;
        let last = topology::position(&train.destination)?;
        let serves = section::direction(&train.origin, &train.destination)? == wanted
            && start.min(last) <= from.min(to)
            && start.max(last) >= from.max(to);
        if !serves {
            return Err(BenchError::application(format!(
                "train {} ({} to {}) does not serve {} to {}",
                train.train_name, train.origin, train.destination, query.origin, query.destination
            )));
        }

        for (seat_class, got) in &train.fares {
            let want = fare::fare(
                &query.origin,
                &query.destination,
                train.train_class,
                *seat_class,
                query.date,
            )?;
            if *got != want {
                return Err(BenchError::application(format!(
                    "train {} quotes {got} for {seat_class} seats, expected {want}",
                    train.train_name
                )));
            }
        }
    }

    Ok(())
}

pub(crate) fn seat_map(query: &SeatQuery, map: &SeatMap) -> Result<(), BenchError> {
    if map.date != query.date
        || map.train_class != query.train_class
        || map.train_name != query.train_name
        || map.car_number != query.car_number
    {
        return Err(BenchError::application(format!(
            "seat map for {} {} car {} on {} does not match the request",
            map.train_class, map.train_name, map.car_number, map.date
        )));
    }

    let expected_class = seat::seat_class_for(map.train_class, map.car_number)?;

    let seats: Vec<_> = map.seats.iter().map(|s| s.seat()).collect();
    if let Some(dup) = seat::duplicate_seats(&seats).first() {
        return Err(BenchError::critical(format!(
            "seat {dup} is listed twice in car {} of train {}",
            map.car_number, map.train_name
        )));
    }

    if let Some(wrong) = map.seats.iter().find(|s| s.seat_class != expected_class) {
        return Err(BenchError::application(format!(
            "seat {} of car {} is listed as {}, expected {expected_class}",
            wrong.seat(),
            map.car_number,
            wrong.seat_class
        )));
    }

    Ok(())
}

pub(crate) fn reserved(resp: &ReserveResponse, expected_amount: u64) -> Result<(), BenchError> {
    if resp.reservation_id == 0 {
        return Err(BenchError::critical("reservation was issued with id 0"));
    }
    if resp.amount != expected_amount {
        return Err(BenchError::application(format!(
            "reservation {} charged {}, expected {expected_amount}",
            resp.reservation_id, resp.amount
        )));
    }
    Ok(())
}

pub(crate) fn summary(got: &ReservationSummary, booking: &Booking) -> Result<(), BenchError> {
    let req = &booking.request;
    if got.reservation_id != booking.id {
        return Err(BenchError::application(format!(
            "asked for reservation {} but got {}",
            booking.id, got.reservation_id
        )));
    }
    if got.amount != booking.amount {
        return Err(BenchError::application(format!(
            "reservation {} lists amount {}, expected {}",
            booking.id, got.amount, booking.amount
        )));
    }
    if got.date != req.date
        || got.train_class != req.train_class
        || got.train_name != req.train_name
        || got.car_number != req.car_number
        || got.origin != req.origin
        || got.destination != req.destination
    {
        return Err(BenchError::application(format!(
            "reservation {} lists a different train or section",
            booking.id
        )));
    }

    let got_seats: HashSet<_> = got.seats.iter().collect();
    let want_seats: HashSet<_> = req.seats.iter().collect();
    if got.seats.len() != req.seats.len() || got_seats != want_seats {
        return Err(BenchError::application(format!(
            "reservation {} lists {} seats, expected {}",
            booking.id,
            got.seats.len(),
            req.seats.len()
        )));
    }

    Ok(())
}

pub(crate) fn listed(list: &[ReservationSummary], booking: &Booking) -> Result<(), BenchError> {
    match list.iter().find(|r| r.reservation_id == booking.id) {
        Some(found) => summary(found, booking),
        None => Err(BenchError::application(format!(
            "reservation {} is missing from the reservation list",
            booking.id
        ))),
    }
}

pub(crate) fn not_listed(list: &[ReservationSummary], id: ReservationId) -> Result<(), BenchError> {
    if list.iter().any(|r| r.reservation_id == id) {
        return Err(BenchError::application(format!(
            "cancelled reservation {id} is still listed"
        )));
    }
    Ok(())
}
