// libs/appointment-cell/src/services/query.rs
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::repository::AppointmentRepository;

// ==============================================================================
// FILTER CRITERIA
// ==============================================================================

/// A single predicate over appointments.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Doctor(Uuid),
    Pet(Uuid),
    Clinic(Uuid),
    Status(AppointmentStatus),
    /// `start_time >= from`
    StartsFrom(DateTime<Utc>),
    /// `start_time < to`
    StartsBefore(DateTime<Utc>),
    /// Case-insensitive substring over reason and notes.
    Text(String),
}

impl Criterion {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        match self {
            Criterion::Doctor(id) => appointment.doctor_id == *id,
            Criterion::Pet(id) => appointment.pet_id == *id,
            Criterion::Clinic(id) => appointment.clinic_id == *id,
            Criterion::Status(status) => appointment.status == *status,
            Criterion::StartsFrom(from) => appointment.start_time >= *from,
            Criterion::StartsBefore(to) => appointment.start_time < *to,
            Criterion::Text(needle) => {
                let needle = needle.to_lowercase();
                [&appointment.reason, &appointment.notes]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }

    /// PostgREST query-string fragment for this predicate.
    pub fn to_postgrest(&self) -> String {
        match self {
            Criterion::Doctor(id) => format!("doctor_id=eq.{}", id),
            Criterion::Pet(id) => format!("pet_id=eq.{}", id),
            Criterion::Clinic(id) => format!("clinic_id=eq.{}", id),
            Criterion::Status(status) => format!("status=in.({})", status.spellings().join(",")),
            Criterion::StartsFrom(from) => format!("start_time=gte.{}", encode_instant(*from)),
            Criterion::StartsBefore(to) => format!("start_time=lt.{}", encode_instant(*to)),
            Criterion::Text(needle) => {
                let pattern = format!("*{}*", sanitize_pattern(needle));
                format!(
                    "or=(reason.ilike.{p},notes.ilike.{p})",
                    p = urlencoding::encode(&pattern)
                )
            }
        }
    }
}

pub(crate) fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
}

// PostgREST reserves these inside an `or=(...)` group.
fn sanitize_pattern(needle: &str) -> String {
    needle
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"'))
        .collect()
}

/// Conjunction of criteria. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    criteria: Vec<Criterion>,
}

impl AppointmentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn doctor(self, id: Uuid) -> Self {
        self.and(Criterion::Doctor(id))
    }

    pub fn pet(self, id: Uuid) -> Self {
        self.and(Criterion::Pet(id))
    }

    pub fn clinic(self, id: Uuid) -> Self {
        self.and(Criterion::Clinic(id))
    }

    pub fn status(self, status: AppointmentStatus) -> Self {
        self.and(Criterion::Status(status))
    }

    /// `[from, to)` on `start_time`; either side may be open.
    pub fn between(self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        let filter = match from {
            Some(from) => self.and(Criterion::StartsFrom(from)),
            None => self,
        };
        match to {
            Some(to) => filter.and(Criterion::StartsBefore(to)),
            None => filter,
        }
    }

    pub fn text(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        if needle.trim().is_empty() {
            return self;
        }
        self.and(Criterion::Text(needle))
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.criteria.iter().all(|c| c.matches(appointment))
    }

    pub fn to_postgrest(&self) -> Vec<String> {
        self.criteria.iter().map(Criterion::to_postgrest).collect()
    }
}

// ==============================================================================
// PAGINATION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// `page_index` is 1-based.
    pub fn new(page_index: u32, page_size: u32) -> Result<Self, AppointmentError> {
        if page_index < 1 {
            return Err(AppointmentError::Validation("page must be at least 1".to_string()));
        }
        if page_size < 1 {
            return Err(AppointmentError::Validation("page_size must be at least 1".to_string()));
        }
        Ok(Self { page_index, page_size })
    }

    pub fn offset(&self) -> usize {
        (self.page_index as usize - 1) * self.page_size as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_index: u32,
    pub page_size: u32,
}

/// Sorts by `(start_time, id)`, counts the full set, then slices.
pub fn paginate(mut rows: Vec<Appointment>, page: PageRequest) -> Page<Appointment> {
    rows.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
    let total_count = rows.len() as u64;

    let items = rows.into_iter().skip(page.offset()).take(page.limit()).collect();

    Page {
        items,
        total_count,
        page_index: page.page_index,
        page_size: page.page_size,
    }
}

// ==============================================================================
// QUERY SERVICE
// ==============================================================================

/// Read side for listing appointments.
pub struct AppointmentQuery {
    repository: Arc<dyn AppointmentRepository>,
    max_page_size: u32,
}

impl AppointmentQuery {
    pub fn new(repository: Arc<dyn AppointmentRepository>, max_page_size: u32) -> Self {
        Self { repository, max_page_size: max_page_size.max(1) }
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    pub async fn search(
        &self,
        filter: &AppointmentFilter,
        page_index: u32,
        page_size: u32,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let page = PageRequest::new(page_index, page_size.min(self.max_page_size))?;
        debug!("Querying appointments with {} criteria, page {:?}", filter.criteria().len(), page);

        self.repository.query(filter, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn appointment(hour: u32, reason: Option<&str>) -> Appointment {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0).unwrap();
        Appointment {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            pet_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            start_time: start,
            duration_minutes: 30,
            status: AppointmentStatus::Pending,
            reason: reason.map(str::to_string),
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn text_criterion_is_case_insensitive() {
        let a = appointment(10, Some("Annual VACCINATION"));
        assert!(AppointmentFilter::new().text("vaccin").matches(&a));
        assert!(!AppointmentFilter::new().text("dental").matches(&a));
        assert!(!AppointmentFilter::new().text("x").matches(&appointment(10, None)));
    }

    #[test]
    fn date_range_is_half_open() {
        let a = appointment(10, None);
        let at = |h| Utc.with_ymd_and_hms(2025, 6, 2, h, 0, 0).unwrap();

        assert!(AppointmentFilter::new().between(Some(at(10)), Some(at(11))).matches(&a));
        assert!(!AppointmentFilter::new().between(Some(at(9)), Some(at(10))).matches(&a));
        assert!(AppointmentFilter::new().between(None, Some(at(11))).matches(&a));
    }

    #[test]
    fn invalid_paging_is_rejected() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 20);
    }

    #[test]
    fn total_count_ignores_slicing() {
        let rows: Vec<_> = (8..15).map(|h| appointment(h, None)).collect();

        let page = paginate(rows.clone(), PageRequest::new(2, 3).unwrap());
        assert_eq!(page.total_count, 7);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].start_time.format("%H").to_string(), "11");

        let last = paginate(rows, PageRequest::new(3, 3).unwrap());
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.total_count, 7);
    }

    #[test]
    fn postgrest_fragments() {
        let doctor = Uuid::new_v4();
        let from = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let parts = AppointmentFilter::new()
            .doctor(doctor)
            .status(AppointmentStatus::Approved)
            .between(Some(from), None)
            .to_postgrest();

        assert_eq!(parts[0], format!("doctor_id=eq.{}", doctor));
        assert_eq!(parts[1], "status=in.(approved,Approved)");
        assert_eq!(parts[2], "start_time=gte.2025-06-02T09%3A00%3A00Z");
    }

    #[test]
    fn status_fragment_includes_legacy_literals() {
        let pending = AppointmentFilter::new().status(AppointmentStatus::Pending).to_postgrest();
        assert_eq!(pending, vec!["status=in.(pending,scheduled,Scheduled,Pending)".to_string()]);

        let cancelled = AppointmentFilter::new().status(AppointmentStatus::Cancelled).to_postgrest();
        assert_eq!(cancelled, vec!["status=in.(cancelled,Cancelled,canceled)".to_string()]);
    }

    #[test]
    fn date_bounds_keep_fractional_seconds() {
        let from = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(500);
        let parts = AppointmentFilter::new().between(Some(from), None).to_postgrest();
        assert_eq!(parts[0], "start_time=gte.2025-06-02T10%3A00%3A00.500Z");

        let mut early = appointment(10, None);
        early.start_time = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(200);
        assert!(!AppointmentFilter::new().between(Some(from), None).matches(&early));
    }
}
