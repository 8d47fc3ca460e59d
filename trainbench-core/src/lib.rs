mod config;
mod constants;
mod data;
mod endpoint;
mod error;
pub mod fare;
mod metrics;
pub mod seat;
pub mod section;
mod stats;
pub mod topology;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use endpoint::*;
pub use error::*;
pub use metrics::*;
pub use stats::*;
