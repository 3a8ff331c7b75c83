//! Stateless due-set predicates over progress records.

use chrono::{DateTime, Utc};

use crate::model::CardProgress;
use crate::time::ceil_days_between;

/// A card is due once `now` reaches its `next_review`.
#[must_use]
pub fn is_due(progress: &CardProgress, now: DateTime<Utc>) -> bool {
    now >= progress.next_review
}

/// A card is overdue once `now` has passed its `next_review`.
///
/// A record exactly at `next_review` is due but not overdue.
#[must_use]
pub fn is_overdue(progress: &CardProgress, now: DateTime<Utc>) -> bool {
    now > progress.next_review
}

/// A record that has never been answered.
#[must_use]
pub fn is_new(progress: &CardProgress) -> bool {
    progress.repetitions == 0 && progress.total_reviews == 0
}

/// Like [`is_new`], but a card without any record also counts as new.
#[must_use]
pub fn is_new_card(progress: Option<&CardProgress>) -> bool {
    progress.is_none_or(is_new)
}

/// Days until the card is due, rounded up. Negative values mean overdue by
/// that many whole days.
#[must_use]
pub fn days_until(progress: &CardProgress, now: DateTime<Utc>) -> i64 {
    ceil_days_between(now, progress.next_review)
}
