//! HTTP runtime for trainbench: clients, random data, alerting and the command line.
pub mod http;
pub mod notify;
pub mod random;
pub mod runtime;

mod error;

pub use crate::error::RuntimeError;
pub use crate::runtime::{write_report, BenchCli, BenchRuntime};
