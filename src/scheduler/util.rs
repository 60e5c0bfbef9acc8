use super::types::SchedError;
use crate::model::{ItemId, ScheduleItem};
use chrono::{DateTime, Duration, Utc};

/// Chevauchement semi-ouvert : des bornes qui se touchent ne se chevauchent pas.
pub(super) fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub(super) fn find_item_index(items: &[ScheduleItem], id: &ItemId) -> Option<usize> {
    items.iter().position(|i| &i.id == id)
}

pub(super) fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds()
}

pub(super) fn sum_seconds(a: i64, b: i64) -> Result<i64, SchedError> {
    a.checked_add(b)
        .ok_or_else(|| SchedError::Validation(format!("{a} + {b} seconds overflows")))
}

/// `at + seconds`, en erreur de validation si le résultat sort de la plage de chrono.
pub(super) fn add_seconds(at: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>, SchedError> {
    Duration::try_seconds(seconds)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or_else(|| {
            SchedError::Validation(format!(
                "{} shifted by {seconds} seconds is out of range",
                at.to_rfc3339()
            ))
        })
}
