#![doc = include_str!("../README.md")]

pub mod client;
pub mod error;
pub mod final_check;
pub mod ledger;
pub mod measurement;
pub mod phase;
pub mod scenario;
pub mod score;
pub mod tally;
#[doc(hidden)]
pub mod transaction;

pub use client::{DataProvider, Notifier, PaymentClient, SutClient};
pub use error::{BenchError, ClientError, Severity};
pub use ledger::{LedgerError, LedgerSnapshot, ReservationLedger};
pub use phase::{BenchReport, Harness, PhaseResult};

pub mod prelude {
    pub use crate::client::{DataProvider, Notifier, PaymentClient, SutClient};
    pub use crate::error::{BenchError, ClientError, Severity};
    pub use crate::phase::{BenchReport, Harness, PhaseResult};
    pub use trainbench_core::{PhaseConfig, PhaseKind, ScoreConfig};
}
