#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::{
    Actor, AppointmentDetails, AppointmentQuery, AppointmentRepository, AppointmentScheduler,
    CreateAppointmentRequest, InMemoryAppointmentRepository, InMemoryDirectory, SchedulingRules,
};
use doctor_cell::{InMemoryScheduleRepository, ScheduleCalendar};
use shared_utils::test_utils::TestConfig;

pub const MONDAY: u8 = 1;

/// 2025-06-02 is a Monday, 2025-06-03 a Tuesday.
pub fn monday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
}

pub fn tuesday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 3, h, m, 0).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn test_rules() -> SchedulingRules {
    SchedulingRules {
        booking_timeout: StdDuration::from_secs(2),
        ..SchedulingRules::default()
    }
}

/// One doctor working Monday 09:00-17:00, one owner with one pet, one clinic.
pub struct Clinic {
    pub scheduler: Arc<AppointmentScheduler>,
    pub query: Arc<AppointmentQuery>,
    pub repository: Arc<dyn AppointmentRepository>,
    pub calendar: Arc<ScheduleCalendar>,
    pub directory: Arc<InMemoryDirectory>,
    pub doctor_id: Uuid,
    pub owner_id: Uuid,
    pub pet_id: Uuid,
    pub clinic_id: Uuid,
}

impl Clinic {
    pub async fn new() -> Self {
        Self::with_repository(Arc::new(InMemoryAppointmentRepository::new()), test_rules()).await
    }

    pub async fn with_repository(repository: Arc<dyn AppointmentRepository>, rules: SchedulingRules) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let calendar = Arc::new(ScheduleCalendar::new(Arc::new(InMemoryScheduleRepository::new())));

        let doctor_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let pet_id = Uuid::new_v4();
        let clinic_id = Uuid::new_v4();

        directory.add_doctor(doctor_id, "Dr. Ada Vet").await;
        directory.add_pet(pet_id, "Rex", owner_id).await;
        directory.add_clinic(clinic_id, "Downtown Clinic").await;
        calendar.add_entry(doctor_id, MONDAY, time(9, 0), time(17, 0)).await.unwrap();

        let scheduler = Arc::new(AppointmentScheduler::new(
            Arc::clone(&repository),
            directory.clone(),
            Arc::clone(&calendar),
            rules.clone(),
        ));
        let query = Arc::new(AppointmentQuery::new(Arc::clone(&repository), rules.max_page_size));

        Self {
            scheduler,
            query,
            repository,
            calendar,
            directory,
            doctor_id,
            owner_id,
            pet_id,
            clinic_id,
        }
    }

    pub fn owner(&self) -> Actor {
        Actor::PetOwner { owner_id: self.owner_id }
    }

    pub fn doctor(&self) -> Actor {
        Actor::Doctor { doctor_id: self.doctor_id }
    }

    pub fn request(&self, start: DateTime<Utc>, minutes: i64) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            doctor_id: self.doctor_id,
            pet_id: self.pet_id,
            clinic_id: self.clinic_id,
            start_time: start,
            duration_minutes: Some(minutes),
            reason: Some("Vaccination".to_string()),
            notes: None,
        }
    }

    pub async fn book(&self, start: DateTime<Utc>, minutes: i64) -> AppointmentDetails {
        self.scheduler
            .create(&self.owner(), self.request(start, minutes))
            .await
            .unwrap()
    }

    /// A second pet with its own owner.
    pub async fn add_pet(&self) -> (Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let pet = Uuid::new_v4();
        self.directory.add_pet(pet, "Milo", owner).await;
        (owner, pet)
    }

    pub fn state(&self) -> AppointmentState {
        AppointmentState {
            config: TestConfig::default().to_arc(),
            scheduler: Arc::clone(&self.scheduler),
            query: Arc::clone(&self.query),
        }
    }
}
