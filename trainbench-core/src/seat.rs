use crate::fare::{SeatClass, TrainClass};
use crate::{CoreError, Seat, CAR_COUNT};
use std::collections::{HashMap, HashSet};

/// Seat class of a car for the given train class. Every train has 16 cars.
pub fn seat_class_for(train_class: TrainClass, car_number: u8) -> Result<SeatClass, CoreError> {
    use SeatClass::*;

    if car_number == 0 || car_number > CAR_COUNT {
        return Err(CoreError::InvalidCarNumber(car_number));
    }

    let class = match (train_class, car_number) {
        (_, 8..=10) => Premium,
        (TrainClass::Fastest, 1..=3) => NonReserved,
        (TrainClass::Fastest, _) => Reserved,
        (TrainClass::Mid, 1..=5) => NonReserved,
        (TrainClass::Mid, _) => Reserved,
        (TrainClass::Slow, 16) => Reserved,
        (TrainClass::Slow, _) => NonReserved,
    };
    Ok(class)
}

/// Car numbers of a train carrying the given seat class.
pub fn cars_with(train_class: TrainClass, seat_class: SeatClass) -> Vec<u8> {
    (1..=CAR_COUNT)
        .filter(|car| seat_class_for(train_class, *car).ok() == Some(seat_class))
        .collect()
}

/// Bonus for booking seats next to each other, keyed on the largest number of distinct
/// columns booked in a single row.
pub fn neighbor_seats_bonus(seats: &[Seat]) -> f64 {
    let mut rows: HashMap<u32, HashSet<&str>> = HashMap::new();
    for seat in seats {
        rows.entry(seat.row).or_default().insert(seat.column.as_str());
    }

    let widest = rows.values().map(HashSet::len).max().unwrap_or(0);
    match widest {
        2 => 0.2,
        3 => 0.4,
        4 => 0.9,
        5 => 1.0,
        _ => 0.,
    }
}

/// Returns the seats that appear more than once.
pub fn duplicate_seats(seats: &[Seat]) -> Vec<&Seat> {
    let mut seen = HashSet::new();
    seats.iter().filter(|seat| !seen.insert(*seat)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats(list: &[(u32, &str)]) -> Vec<Seat> {
        list.iter().map(|(r, c)| Seat::new(*r, c)).collect()
    }

    #[test]
    fn seat_classes() {
        assert_eq!(
            seat_class_for(TrainClass::Fastest, 3).unwrap(),
            SeatClass::NonReserved
        );
        assert_eq!(
            seat_class_for(TrainClass::Fastest, 4).unwrap(),
            SeatClass::Reserved
        );
        assert_eq!(
            seat_class_for(TrainClass::Mid, 6).unwrap(),
            SeatClass::Reserved
        );
        assert_eq!(
            seat_class_for(TrainClass::Mid, 9).unwrap(),
            SeatClass::Premium
        );
        assert_eq!(
            seat_class_for(TrainClass::Slow, 12).unwrap(),
            SeatClass::NonReserved
        );
        assert_eq!(
            seat_class_for(TrainClass::Slow, 16).unwrap(),
            SeatClass::Reserved
        );
        assert_eq!(
            seat_class_for(TrainClass::Slow, 17),
            Err(CoreError::InvalidCarNumber(17))
        );
        assert!(seat_class_for(TrainClass::Mid, 0).is_err());
    }

    #[test]
    fn cars_by_class() {
        assert_eq!(
            cars_with(TrainClass::Slow, SeatClass::Reserved),
            vec![16]
        );
        assert_eq!(
            cars_with(TrainClass::Fastest, SeatClass::Premium),
            vec![8, 9, 10]
        );
    }

    #[test]
    fn neighbor_bonus() {
        let cases = [
            (
                seats(&[(1, "A"), (2, "B"), (3, "C"), (4, "D"), (5, "E")]),
                0.,
            ),
            (
                seats(&[(1, "A"), (1, "B"), (2, "C"), (3, "A"), (3, "B")]),
                0.2,
            ),
            (seats(&[(1, "A"), (1, "B"), (1, "C"), (2, "A")]), 0.4),
            (
                seats(&[(1, "A"), (1, "B"), (1, "C"), (1, "D"), (3, "A")]),
                0.9,
            ),
            (
                seats(&[(1, "A"), (1, "B"), (1, "C"), (1, "D"), (1, "E")]),
                1.0,
            ),
            (seats(&[]), 0.),
        ];

        for (seats, want) in cases {
            assert_eq!(neighbor_seats_bonus(&seats), want, "{seats:?}");
        }
    }

    #[test]
    fn duplicates() {
        let list = seats(&[(1, "A"), (1, "B"), (1, "A")]);
        assert_eq!(duplicate_seats(&list), vec![&Seat::new(1, "A")]);
        assert!(duplicate_seats(&seats(&[(1, "A"), (2, "A")])).is_empty());
    }
}
