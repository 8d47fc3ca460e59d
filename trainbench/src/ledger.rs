//! Shadow ledger of reservations the harness believes the service holds.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;
use trainbench_core::{fare, CoreError, ReservationId, ReservationRecord, ReservationRequest, User};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Reservation {0} not found in ledger")]
    ReservationNotFound(ReservationId),

    #[error("Ledger check failed: {0}")]
    Core(#[from] CoreError),

    #[error("Reservation ledger lock is poisoned")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for LedgerError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}

/// Concurrent reservation ledger.
///
/// Admission checks and lookups take a shared lock for their whole duration, inserts and
/// cancellations take an exclusive one. Nothing spans two operations, so a check followed by
/// an insert may race with another task doing the same.
#[derive(Default)]
pub struct ReservationLedger {
    records: RwLock<HashMap<ReservationId, ReservationRecord>>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if any live reservation on the same train shares a seat with the
    /// candidate on an overlapping section in the same direction.
    pub fn can_reserve(&self, candidate: &ReservationRequest) -> Result<bool, LedgerError> {
        let section = candidate.section();
        // Resolve the candidate's stations even when nothing else is booked on the train.
        section.direction()?;

        let records = self.records.read()?;
        for record in records.values() {
            let existing = &record.request;
            if !existing.same_train(candidate) {
                continue;
            }
            if !existing.section().conflicts_with(&section)? {
                continue;
            }
            if existing.shares_seat_with(candidate) {
                debug!(
                    "Candidate {}->{} conflicts with reservation {}",
                    candidate.origin, candidate.destination, record.id
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Records a reservation made by `user`. An existing record with the same id is replaced.
    ///
    /// The service already holds the reservation, so the record is kept even when its fare
    /// cannot be computed. The fare error is returned after the insert and the record carries
    /// no amount.
    pub fn add(
        &self,
        user: &User,
        request: &ReservationRequest,
        id: ReservationId,
    ) -> Result<u64, LedgerError> {
        let amount = fare::amount(request);
        let record = ReservationRecord {
            id,
            user: user.clone(),
            request: request.clone(),
            amount: amount.as_ref().ok().copied(),
            committed: false,
        };

        if self.records.write()?.insert(id, record).is_some() {
            debug!("Reservation {id} was reissued by the service");
        }
        Ok(amount?)
    }

    /// Marks a reservation as paid and returns its amount, if known.
    pub fn commit(&self, id: ReservationId) -> Result<Option<u64>, LedgerError> {
        let mut records = self.records.write()?;
        let record = records
            .get_mut(&id)
            .ok_or(LedgerError::ReservationNotFound(id))?;
        record.committed = true;
        Ok(record.amount)
    }

    pub fn cancel(&self, id: ReservationId) -> Result<ReservationRecord, LedgerError> {
        self.records
            .write()?
            .remove(&id)
            .ok_or(LedgerError::ReservationNotFound(id))
    }

    /// Puts back a record removed by [`cancel`](Self::cancel).
    pub fn restore(&self, record: ReservationRecord) -> Result<(), LedgerError> {
        self.records.write()?.insert(record.id, record);
        Ok(())
    }

    pub fn lookup(&self, id: ReservationId) -> Result<Option<ReservationRecord>, LedgerError> {
        Ok(self.records.read()?.get(&id).cloned())
    }

    /// Visits a point-in-time copy of every record.
    pub fn range<F>(&self, mut visit: F) -> Result<(), LedgerError>
    where
        F: FnMut(&ReservationRecord),
    {
        let snapshot = self.snapshot()?;
        snapshot.records.iter().for_each(|record| visit(record));
        Ok(())
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let mut records: Vec<_> = self.records.read()?.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(LedgerSnapshot { records })
    }

    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.records.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }
}

/// Ledger contents ordered by reservation id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub records: Vec<ReservationRecord>,
}

impl LedgerSnapshot {
    pub fn get(&self, id: ReservationId) -> Option<&ReservationRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::date;
    use trainbench_core::fare::{SeatClass, TrainClass};
    use trainbench_core::Seat;

    fn user() -> User {
        User::new("traveller@example.com", "password")
    }

    fn request(origin: &str, destination: &str, seats: &[(u32, &str)]) -> ReservationRequest {
        ReservationRequest {
            date: date!(2020 - 03 - 20),
            origin: origin.to_string(),
            destination: destination.to_string(),
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
    fn add_cancel_lookup() {
        let ledger = ReservationLedger::new();
        let req = request("Tokyo", "Nagoya", &[(1, "A")]);
        ledger.add(&user(), &req, 10).unwrap();
        assert!(ledger.lookup(10).unwrap().is_some());

        ledger.cancel(10).unwrap();
        assert_eq!(ledger.lookup(10).unwrap(), None);
        assert_eq!(
            ledger.cancel(10),
            Err(LedgerError::ReservationNotFound(10))
        );
    }

    #[test]
    fn admission_flips_after_cancel() {
        let ledger = ReservationLedger::new();
        let first = request("Furuoka", "Arakawa", &[(1, "A")]);
        let second = request("Tokyo", "Isogawa", &[(1, "A")]);

        assert!(ledger.can_reserve(&second).unwrap());
        ledger.add(&user(), &first, 10).unwrap();
        assert!(!ledger.can_reserve(&second).unwrap());

        let record = ledger.cancel(10).unwrap();
        assert!(ledger.can_reserve(&second).unwrap());

        ledger.restore(record).unwrap();
        assert!(!ledger.can_reserve(&second).unwrap());
    }

    #[test]
    fn downbound_admission() {
        let ledger = ReservationLedger::new();
        ledger
            .add(&user(), &request("Furuoka", "Arakawa", &[(1, "A")]), 10)
            .unwrap();

        let mut other_day = request("Furuoka", "Arakawa", &[(1, "A")]);
        other_day.date = date!(2020 - 03 - 21);
        let mut other_car = request("Furuoka", "Arakawa", &[(1, "A")]);
        other_car.car_number = 7;
        let mut other_train = request("Furuoka", "Arakawa", &[(1, "A")]);
        other_train.train_name = "1002".to_string();

        let cases = [
            (other_day, true),
            (other_car, true),
            (other_train, true),
            (request("Furuoka", "Arakawa", &[(1, "A")]), false),
            (request("Furuoka", "Arakawa", &[(9999, "E")]), true),
            (request("Tokyo", "Isogawa", &[(1, "A")]), false),
            (request("Yamada", "Naruto", &[(1, "A")]), false),
            (request("Arakawa", "Naruto", &[(1, "A")]), true),
            (request("Tokyo", "Furuoka", &[(1, "A")]), true),
            (request("Naruto", "Furuoka", &[(1, "A")]), true),
        ];

        for (candidate, want) in cases {
            assert_eq!(
                ledger.can_reserve(&candidate).unwrap(),
                want,
                "{candidate:?}"
            );
        }
    }

    #[test]
    fn upbound_admission() {
        let ledger = ReservationLedger::new();
        ledger
            .add(&user(), &request("Arakawa", "Furuoka", &[(1, "A")]), 10)
            .unwrap();

        let cases = [
            (request("Arakawa", "Furuoka", &[(1, "A")]), false),
            (request("Isogawa", "Tokyo", &[(1, "A")]), false),
            (request("Naruto", "Yamada", &[(1, "A")]), false),
            (request("Naruto", "Arakawa", &[(1, "A")]), true),
            (request("Furuoka", "Tokyo", &[(1, "A")]), true),
            (request("Furuoka", "Arakawa", &[(1, "A")]), true),
        ];

        for (candidate, want) in cases {
            assert_eq!(
                ledger.can_reserve(&candidate).unwrap(),
                want,
                "{candidate:?}"
            );
        }
    }

    #[test]
    fn unknown_station_aborts_the_check() {
        let ledger = ReservationLedger::new();
        let req = request("Tokyo", "Nowhere", &[(1, "A")]);
        assert_eq!(
            ledger.can_reserve(&req),
            Err(LedgerError::Core(CoreError::UnknownStation(
                "Nowhere".to_string()
            )))
        );
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn unpriced_reservation_is_still_recorded() {
        let ledger = ReservationLedger::new();
        let req = request("Tokyo", "Nowhere", &[(1, "A")]);
        assert_eq!(
            ledger.add(&user(), &req, 1),
            Err(LedgerError::Core(CoreError::UnknownStation(
                "Nowhere".to_string()
            )))
        );

        let record = ledger.lookup(1).unwrap().unwrap();
        assert_eq!(record.amount, None);
        assert_eq!(record.request, req);
        assert_eq!(ledger.commit(1).unwrap(), None);
        assert!(ledger.cancel(1).is_ok());
    }

    #[test]
    fn commit_and_amount() {
        let ledger = ReservationLedger::new();
        let mut req = request("Tokyo", "Osaka", &[(1, "A"), (1, "B")]);
        req.adults = 1;
        req.children = 1;
        req.date = date!(2020 - 06 - 01);

        let amount = ledger.add(&user(), &req, 5).unwrap();
        // 20000 * 1.25 = 25000 per adult, half for the child
        assert_eq!(amount, 25000 + 12500);
        assert_eq!(ledger.commit(5).unwrap(), Some(amount));
        assert!(ledger.lookup(5).unwrap().unwrap().committed);
        assert_eq!(ledger.commit(6), Err(LedgerError::ReservationNotFound(6)));
    }

    #[test]
    fn duplicate_ids_overwrite() {
        let ledger = ReservationLedger::new();
        ledger
            .add(&user(), &request("Tokyo", "Nagoya", &[(1, "A")]), 3)
            .unwrap();
        ledger
            .add(&user(), &request("Kyoto", "Osaka", &[(2, "B")]), 3)
            .unwrap();

        assert_eq!(ledger.len().unwrap(), 1);
        let record = ledger.lookup(3).unwrap().unwrap();
        assert_eq!(record.request.origin, "Kyoto");
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let ledger = ReservationLedger::new();
        for id in [3, 1, 2] {
            ledger
                .add(&user(), &request("Tokyo", "Nagoya", &[(id as u32, "A")]), id)
                .unwrap();
        }

        let snapshot = ledger.snapshot().unwrap();
        ledger.cancel(2).unwrap();

        let ids: Vec<_> = snapshot.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(snapshot.get(2).is_some());

        let mut visited = vec![];
        ledger.range(|r| visited.push(r.id)).unwrap();
        assert_eq!(visited, vec![1, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(5000)]
    async fn concurrent_admission_and_inserts() {
        let ledger = Arc::new(ReservationLedger::new());
        let mut handles = vec![];
        for id in 0..64u64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let req = request("Tokyo", "Nagoya", &[(id as u32, "A")]);
                assert!(ledger.can_reserve(&req).unwrap());
                ledger.add(&user(), &req, id).unwrap();
                assert!(!ledger.can_reserve(&req).unwrap());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ledger.len().unwrap(), 64);
    }
}
