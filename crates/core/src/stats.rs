use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::due::{is_due, is_new, is_overdue};
use crate::model::CardProgress;

/// Aggregate counts over a set of progress records.
///
/// Categories overlap the same way the predicates in [`crate::due`] do: every
/// overdue record is also due, and a freshly created record is both new and due.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressStats {
    pub total: usize,
    pub new: usize,
    pub due: usize,
    pub overdue: usize,
    pub mastered: usize,
    pub average_ease_factor: Option<f64>,
    pub accuracy: Option<f64>,
}

impl ProgressStats {
    /// Fold `records` into counts as of `now`.
    ///
    /// `average_ease_factor` is `None` for an empty set; `accuracy` is `None`
    /// until at least one answer was recorded.
    #[must_use]
    pub fn collect<'a>(
        records: impl IntoIterator<Item = &'a CardProgress>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self::default();
        let mut ease_sum = 0.0;
        let mut seen: u64 = 0;
        let mut correct: u64 = 0;

        for p in records {
            stats.total += 1;
            stats.new += usize::from(is_new(p));
            stats.due += usize::from(is_due(p, now));
            stats.overdue += usize::from(is_overdue(p, now));
            stats.mastered += usize::from(p.is_mastered);
            ease_sum += p.ease_factor;
            seen += u64::from(p.times_seen);
            correct += u64::from(p.times_correct);
        }

        if stats.total > 0 {
            #[allow(clippy::cast_precision_loss)]
            let total = stats.total as f64;
            stats.average_ease_factor = Some(ease_sum / total);
        }
        if seen > 0 {
            #[allow(clippy::cast_precision_loss)]
            let ratio = correct as f64 / seen as f64;
            stats.accuracy = Some(ratio);
        }

        stats
    }
}
