use thiserror::Error;
use time::Date;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Unknown station: {0}")]
    UnknownStation(String),

    #[error("Distance {0} does not fall into any fare tier")]
    InvalidDistance(f64),

    #[error("Unknown train class: {0}")]
    UnknownTrainClass(String),

    #[error("Unknown seat class: {0}")]
    UnknownSeatClass(String),

    #[error("Car number {0} is out of range")]
    InvalidCarNumber(u8),

    #[error("Travel date {0} is not covered by any fare season")]
    OutOfSeason(Date),

    #[error("Travel window of {0} days is out of range")]
    InvalidTravelWindow(u16),
}
