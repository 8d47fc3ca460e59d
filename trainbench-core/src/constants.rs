use std::time::Duration;
use time::{macros::date, Date};

/// Number of application errors tolerated in a phase before it is failed.
pub const DEFAULT_APPLICATION_BUDGET: u64 = 10;

pub const APPLICATION_PENALTY_WEIGHT: u64 = 500;
pub const TRIVIAL_PENALTY_THRESHOLD: u64 = 200;
pub const TRIVIAL_PENALTY_WEIGHT: u64 = 5000;
pub const TRIVIAL_PENALTY_PER_COUNT: u64 = 100;

/// Extra score for every successful booking of a reserved or premium seat.
pub const RESERVED_SEAT_EXTRA_SCORE: u64 = 10;

pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);
pub const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_PRETEST_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(60);
pub const DEFAULT_POSTTEST_DEADLINE: Duration = Duration::from_secs(30);

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Capacity of the per-phase step outcome queue.
pub const RESULT_QUEUE_CAPACITY: usize = 2000;

pub const RESERVATION_START_DATE: Date = date!(2020 - 03 - 01);
pub const MAX_RESERVATION_DAYS: u16 = 159;

pub const CAR_COUNT: u8 = 16;
