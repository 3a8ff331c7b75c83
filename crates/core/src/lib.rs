#![forbid(unsafe_code)]

pub mod due;
pub mod model;
pub mod scheduler;
pub mod stats;
pub mod time;

pub use scheduler::{Preview, SchedulerError, preview, schedule};
pub use stats::ProgressStats;
pub use time::Clock;
