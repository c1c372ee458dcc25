// libs/appointment-cell/src/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{DatabaseError, SupabaseClient, EXCLUSION_VIOLATION, UNIQUE_VIOLATION};

use crate::models::{Appointment, AppointmentError, EntityKind};
use crate::repository::AppointmentRepository;
use crate::services::query::{encode_instant, AppointmentFilter, Page, PageRequest};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// PostgREST-backed repository over the `appointments` table.
///
/// The table is expected to carry an exclusion constraint on
/// `(doctor_id, tstzrange(start_time, end_time))` for rows that are not
/// cancelled; its violation surfaces as [`AppointmentError::SlotUnavailable`].
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?{}", APPOINTMENTS_PATH, query);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        parse_rows(rows)
    }

    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_prefer(method, path, body, Some("return=representation"))
            .await
            .map_err(write_error)?;
        parse_rows(rows)
    }
}

fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Appointment>, _>>()
        .map_err(|e| AppointmentError::Database(format!("Failed to parse appointments: {}", e)))
}

fn write_error(e: DatabaseError) -> AppointmentError {
    match e.constraint_code() {
        Some(EXCLUSION_VIOLATION) => {
            warn!("Storage rejected overlapping appointment: {}", e);
            AppointmentError::SlotUnavailable("overlaps an existing appointment".to_string())
        }
        Some(UNIQUE_VIOLATION) => AppointmentError::Conflict(e.to_string()),
        _ => AppointmentError::from(e),
    }
}

fn appointment_body(appointment: &Appointment) -> Result<Value, AppointmentError> {
    serde_json::to_value(appointment)
        .map_err(|e| AppointmentError::Database(format!("Failed to encode appointment: {}", e)))
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self
            .fetch(&format!("id=eq.{}&limit=1", appointment_id))
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_doctor_and_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let next_day = day_start + Duration::days(1);

        let query = format!(
            "doctor_id=eq.{}&and=(start_time.gte.{},start_time.lt.{})&order=start_time.asc",
            doctor_id,
            encode_instant(day_start),
            encode_instant(next_day)
        );
        self.fetch(&query).await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        debug!("Inserting appointment {} for doctor {}", appointment.id, appointment.doctor_id);

        let body = appointment_body(&appointment)?;
        self.write(Method::POST, APPOINTMENTS_PATH, Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Insert returned no rows".to_string()))
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment.id);

        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment.id);
        let body = appointment_body(&appointment)?;
        self.write(Method::PATCH, &path, Some(body))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Appointment, appointment.id))
    }

    async fn delete(&self, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        Ok(!self.write(Method::DELETE, &path, None).await?.is_empty())
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<u64, AppointmentError> {
        let path = format!("{}?doctor_id=eq.{}", APPOINTMENTS_PATH, doctor_id);
        Ok(self.write(Method::DELETE, &path, None).await?.len() as u64)
    }

    async fn query(
        &self,
        filter: &AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let mut params = filter.to_postgrest();
        params.push("order=start_time.asc,id.asc".to_string());
        params.push(format!("offset={}", page.offset()));
        params.push(format!("limit={}", page.limit()));

        let path = format!("{}?{}", APPOINTMENTS_PATH, params.join("&"));
        let (rows, total): (Vec<Value>, Option<u64>) = self.supabase.request_with_count(&path).await?;
        let total_count = total.ok_or_else(|| {
            AppointmentError::Database("Response carried no Content-Range row count".to_string())
        })?;

        Ok(Page {
            items: parse_rows(rows)?,
            total_count,
            page_index: page.page_index,
            page_size: page.page_size,
        })
    }
}
