mod plan;
mod service;

// Public API of the review queue.
pub use crate::error::QueueError;
pub use plan::{QueueBuilder, QueueEntry, QueueLimits, ReviewBucket, ReviewQueue};
pub use service::QueueService;
