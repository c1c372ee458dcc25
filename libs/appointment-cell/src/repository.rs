// libs/appointment-cell/src/repository.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, EntityKind};
use crate::services::query::{paginate, AppointmentFilter, Page, PageRequest};

/// Storage contract for appointments.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Appointments of the doctor whose `start_time` falls on the UTC date,
    /// cancelled ones included.
    async fn find_by_doctor_and_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Replaces the stored row; `NotFound` when it no longer exists.
    async fn update(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, appointment_id: Uuid) -> Result<bool, AppointmentError>;

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<u64, AppointmentError>;

    async fn query(
        &self,
        filter: &AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, AppointmentError>;
}

// ==============================================================================
// IN-MEMORY REPOSITORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn find_by_doctor_and_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let mut result: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.start_time.date_naive() == date)
            .cloned()
            .collect();
        result.sort_by_key(|a| a.start_time);
        Ok(result)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::Conflict(format!(
                "Appointment {} already exists",
                appointment.id
            )));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;

        match appointments.get_mut(&appointment.id) {
            Some(stored) => {
                *stored = appointment.clone();
                Ok(appointment)
            }
            None => Err(AppointmentError::not_found(EntityKind::Appointment, appointment.id)),
        }
    }

    async fn delete(&self, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.appointments.write().await.remove(&appointment_id).is_some())
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<u64, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let before = appointments.len();
        appointments.retain(|_, a| a.doctor_id != doctor_id);
        Ok((before - appointments.len()) as u64)
    }

    async fn query(
        &self,
        filter: &AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let appointments = self.appointments.read().await;
        let rows: Vec<Appointment> = appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }
}
