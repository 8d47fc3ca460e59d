//! End-of-benchmark reconciliation of the ledger against the payment settlement.
use crate::error::BenchError;
use crate::ledger::LedgerSnapshot;
use std::collections::HashMap;
use tracing::debug;
use trainbench_core::{PaymentRecord, PaymentSettlement, ReservationId};

/// Compares every ledger record with the charges the payment service recorded for it.
///
/// A committed reservation needs exactly one active charge of the same amount. An uncommitted
/// one may carry a charge when the commit response was lost, but its amount must still agree.
/// A charge against a record whose fare could not be computed is always a finding.
/// Active charges for reservations the ledger never saw are flagged too. Every finding is
/// critical.
pub fn final_check(ledger: &LedgerSnapshot, settlement: &PaymentSettlement) -> Vec<BenchError> {
    let mut charges: HashMap<ReservationId, Vec<&PaymentRecord>> = HashMap::new();
    for record in settlement.records.iter().filter(|r| !r.is_canceled) {
        charges.entry(record.reservation_id).or_default().push(record);
    }

    let mut errors = Vec::new();
    for record in &ledger.records {
        let active = charges.remove(&record.id).unwrap_or_default();
        match active.as_slice() {
            [] if record.committed => errors.push(BenchError::critical(format!(
                "reservation {} was committed but has no active charge",
                record.id
            ))),
            [] => {}
            [charge] => match record.amount {
                Some(expected) if expected != charge.amount => {
                    errors.push(BenchError::critical(format!(
                        "reservation {}: charged {} but expected {expected}",
                        record.id, charge.amount
                    )))
                }
                Some(_) => {}
                None => errors.push(BenchError::critical(format!(
                    "reservation {}: charged {} but its fare is unknown",
                    record.id, charge.amount
                ))),
            },
            many => errors.push(BenchError::critical(format!(
                "reservation {} has {} active charges",
                record.id,
                many.len()
            ))),
        }
    }

    let mut orphans: Vec<_> = charges.into_keys().collect();
    orphans.sort_unstable();
    for id in orphans {
        errors.push(BenchError::critical(format!(
            "charge for reservation {id} has no matching reservation"
        )));
    }

    debug!(
        "Reconciled {} reservations against {} charges, {} findings",
        ledger.len(),
        settlement.records.len(),
        errors.len()
    );
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use time::macros::date;
    use trainbench_core::fare::{SeatClass, TrainClass};
    use trainbench_core::{ReservationRecord, ReservationRequest, Seat, User};

    fn record(id: ReservationId, amount: u64, committed: bool) -> ReservationRecord {
        unpriced(id, Some(amount), committed)
    }

    fn unpriced(id: ReservationId, amount: Option<u64>, committed: bool) -> ReservationRecord {
        ReservationRecord {
            id,
            user: User::new("alice@example.com", "pw"),
            request: ReservationRequest {
                date: date!(2020 - 06 - 01),
                origin: "Tokyo".into(),
                destination: "Osaka".into(),
                train_class: TrainClass::Mid,
                train_name: "100".into(),
                car_number: 4,
                seat_class: SeatClass::Reserved,
                seats: vec![Seat::new(1, "A")],
                adults: 1,
                children: 0,
            },
            amount,
            committed,
        }
    }

    fn charge(id: ReservationId, amount: u64, is_canceled: bool) -> PaymentRecord {
        PaymentRecord {
            card_token: format!("token-{id}"),
            reservation_id: id,
            amount,
            is_canceled,
        }
    }

    fn check(records: Vec<ReservationRecord>, charges: Vec<PaymentRecord>) -> Vec<BenchError> {
        final_check(
            &LedgerSnapshot { records },
            &PaymentSettlement { records: charges },
        )
    }

    #[test]
    fn matching_settlement() {
        let errors = check(
            vec![record(1, 1000, true), record(2, 2000, true)],
            vec![charge(2, 2000, false), charge(1, 1000, false)],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn canceled_charges_are_ignored() {
        let errors = check(
            vec![record(1, 1000, true)],
            vec![charge(1, 1000, true), charge(1, 1000, false), charge(9, 10, true)],
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_charge() {
        let errors = check(vec![record(1, 1000, true)], vec![charge(1, 1000, true)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Critical);
        assert!(errors[0].message.contains("no active charge"));
    }

    #[test]
    fn amount_mismatch() {
        let errors = check(vec![record(1, 1000, true)], vec![charge(1, 999, false)]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("charged 999 but expected 1000"));
    }

    #[test]
    fn double_charge() {
        let errors = check(
            vec![record(1, 1000, true)],
            vec![charge(1, 1000, false), charge(1, 1000, false)],
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("2 active charges"));
    }

    #[test]
    fn orphan_charge() {
        let errors = check(vec![], vec![charge(7, 500, false)]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("reservation 7"));
    }

    #[test]
    fn uncommitted_records() {
        let errors = check(
            vec![record(1, 1000, false), record(2, 2000, false)],
            vec![charge(1, 1000, false)],
        );
        assert!(errors.is_empty());

        let errors = check(vec![record(1, 1000, false)], vec![charge(1, 5, false)]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unpriced_records() {
        let errors = check(vec![unpriced(1, None, false)], vec![]);
        assert!(errors.is_empty());

        let errors = check(vec![unpriced(1, None, true)], vec![charge(1, 1000, false)]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("fare is unknown"));

        let errors = check(vec![unpriced(1, None, true)], vec![]);
        assert!(errors[0].message.contains("no active charge"));
    }
}
