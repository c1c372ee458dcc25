// libs/doctor-cell/src/repository.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{DatabaseError, SupabaseClient, UNIQUE_VIOLATION};

use crate::models::{ScheduleEntry, ScheduleError};

/// Storage contract for weekly schedule entries.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn find_entry(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<ScheduleEntry>, ScheduleError>;

    async fn find_by_id(&self, schedule_id: Uuid) -> Result<Option<ScheduleEntry>, ScheduleError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, ScheduleError>;

    /// Must fail with [`ScheduleError::Conflict`] when the doctor already has
    /// an entry for the same day, even under concurrent inserts.
    async fn insert(&self, entry: ScheduleEntry) -> Result<ScheduleEntry, ScheduleError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, schedule_id: Uuid) -> Result<bool, ScheduleError>;

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<u64, ScheduleError>;
}

// ==============================================================================
// IN-MEMORY REPOSITORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryScheduleRepository {
    entries: RwLock<HashMap<Uuid, ScheduleEntry>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn find_entry(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<ScheduleEntry>, ScheduleError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .find(|e| e.doctor_id == doctor_id && e.day_of_week == day_of_week)
            .cloned())
    }

    async fn find_by_id(&self, schedule_id: Uuid) -> Result<Option<ScheduleEntry>, ScheduleError> {
        Ok(self.entries.read().await.get(&schedule_id).cloned())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let entries = self.entries.read().await;
        let mut result: Vec<ScheduleEntry> = entries
            .values()
            .filter(|e| e.doctor_id == doctor_id)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.day_of_week);
        Ok(result)
    }

    async fn insert(&self, entry: ScheduleEntry) -> Result<ScheduleEntry, ScheduleError> {
        let mut entries = self.entries.write().await;

        let taken = entries
            .values()
            .any(|e| e.doctor_id == entry.doctor_id && e.day_of_week == entry.day_of_week);
        if taken {
            return Err(ScheduleError::Conflict {
                doctor_id: entry.doctor_id,
                day_of_week: entry.day_of_week,
            });
        }

        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn delete(&self, schedule_id: Uuid) -> Result<bool, ScheduleError> {
        Ok(self.entries.write().await.remove(&schedule_id).is_some())
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<u64, ScheduleError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.doctor_id != doctor_id);
        Ok((before - entries.len()) as u64)
    }
}

// ==============================================================================
// SUPABASE REPOSITORY
// ==============================================================================

/// PostgREST-backed repository over the `doctor_schedules` table, which is
/// expected to carry a unique index on `(doctor_id, day_of_week)`.
pub struct SupabaseScheduleRepository {
    supabase: Arc<SupabaseClient>,
}

const SCHEDULES_PATH: &str = "/rest/v1/doctor_schedules";

impl SupabaseScheduleRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        let path = format!("{}?{}", SCHEDULES_PATH, query);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(db_error)?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ScheduleEntry>, _>>()
            .map_err(|e| {
                ScheduleError::Database(format!("Failed to parse schedule entries: {}", e))
            })
    }

    async fn delete_where(&self, query: &str) -> Result<u64, ScheduleError> {
        let path = format!("{}?{}", SCHEDULES_PATH, query);
        let deleted: Vec<Value> = self
            .supabase
            .request_with_prefer(Method::DELETE, &path, None, Some("return=representation"))
            .await
            .map_err(db_error)?;
        Ok(deleted.len() as u64)
    }
}

fn db_error(e: DatabaseError) -> ScheduleError {
    ScheduleError::Database(e.to_string())
}

#[async_trait]
impl ScheduleRepository for SupabaseScheduleRepository {
    async fn find_entry(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<ScheduleEntry>, ScheduleError> {
        let query = format!("doctor_id=eq.{}&day_of_week=eq.{}&limit=1", doctor_id, day_of_week);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    async fn find_by_id(&self, schedule_id: Uuid) -> Result<Option<ScheduleEntry>, ScheduleError> {
        Ok(self.fetch(&format!("id=eq.{}", schedule_id)).await?.into_iter().next())
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        self.fetch(&format!("doctor_id=eq.{}&order=day_of_week.asc", doctor_id)).await
    }

    async fn insert(&self, entry: ScheduleEntry) -> Result<ScheduleEntry, ScheduleError> {
        debug!("Inserting schedule entry {} for doctor {}", entry.id, entry.doctor_id);

        let body = json!({
            "id": entry.id,
            "doctor_id": entry.doctor_id,
            "day_of_week": entry.day_of_week,
            "start_time": entry.start_time.format("%H:%M:%S").to_string(),
            "end_time": entry.end_time.format("%H:%M:%S").to_string(),
        });

        let result: Result<Vec<ScheduleEntry>, DatabaseError> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                SCHEDULES_PATH,
                Some(body),
                Some("return=representation"),
            )
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| ScheduleError::Database("Insert returned no rows".to_string())),
            Err(e) if e.constraint_code() == Some(UNIQUE_VIOLATION) => Err(ScheduleError::Conflict {
                doctor_id: entry.doctor_id,
                day_of_week: entry.day_of_week,
            }),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn delete(&self, schedule_id: Uuid) -> Result<bool, ScheduleError> {
        Ok(self.delete_where(&format!("id=eq.{}", schedule_id)).await? > 0)
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<u64, ScheduleError> {
        self.delete_where(&format!("doctor_id=eq.{}", doctor_id)).await
    }
}
