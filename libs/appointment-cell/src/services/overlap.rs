// libs/appointment-cell/src/services/overlap.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Appointment;

/// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` share at least one
/// instant. Touching endpoints do not overlap.
pub fn overlaps<T: PartialOrd>(s1: T, e1: T, s2: T, e2: T) -> bool {
    s1 < e2 && s2 < e1
}

/// Ids of the slot-holding appointments that collide with `[start, end)`.
pub fn conflicting_ids<'a, I>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: I,
    exclude: Option<Uuid>,
) -> Vec<Uuid>
where
    I: IntoIterator<Item = &'a Appointment>,
{
    existing
        .into_iter()
        .filter(|a| a.blocks_slot())
        .filter(|a| Some(a.id) != exclude)
        .filter(|a| overlaps(start, end, a.start_time, a.end_time()))
        .map(|a| a.id)
        .collect()
}
