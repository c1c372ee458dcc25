// libs/appointment-cell/src/directory.rs
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, DisplayNames};

/// Lookups against the doctors, pets and clinics the scheduler only refers to.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, AppointmentError>;

    async fn pet_exists(&self, pet_id: Uuid) -> Result<bool, AppointmentError>;

    async fn clinic_exists(&self, clinic_id: Uuid) -> Result<bool, AppointmentError>;

    /// Owner of the pet, `None` when the pet is unknown.
    async fn pet_owner(&self, pet_id: Uuid) -> Result<Option<Uuid>, AppointmentError>;

    async fn display_names(
        &self,
        doctor_id: Uuid,
        pet_id: Uuid,
        clinic_id: Uuid,
    ) -> Result<DisplayNames, AppointmentError>;
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
struct NamedSeed {
    id: Uuid,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PetSeed {
    id: Uuid,
    name: String,
    owner_id: Uuid,
}

/// Seed file layout: `{"doctors": [...], "pets": [...], "clinics": [...]}`.
#[derive(Debug, Default, Deserialize)]
struct DirectorySeed {
    #[serde(default)]
    doctors: Vec<NamedSeed>,
    #[serde(default)]
    pets: Vec<PetSeed>,
    #[serde(default)]
    clinics: Vec<NamedSeed>,
}

#[derive(Debug, Clone)]
struct PetRecord {
    name: String,
    owner_id: Uuid,
}

#[derive(Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<HashMap<Uuid, String>>,
    pets: RwLock<HashMap<Uuid, PetRecord>>,
    clinics: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON seed file.
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, AppointmentError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppointmentError::Validation(format!("Cannot read directory seed {}: {}", path.display(), e))
        })?;
        let seed: DirectorySeed = serde_json::from_str(&raw).map_err(|e| {
            AppointmentError::Validation(format!("Invalid directory seed {}: {}", path.display(), e))
        })?;

        let directory = Self::new();
        for doctor in seed.doctors {
            directory.add_doctor(doctor.id, doctor.name).await;
        }
        for pet in seed.pets {
            directory.add_pet(pet.id, pet.name, pet.owner_id).await;
        }
        for clinic in seed.clinics {
            directory.add_clinic(clinic.id, clinic.name).await;
        }

        info!(
            "Directory seeded from {}: {} doctors, {} pets, {} clinics",
            path.display(),
            directory.doctors.read().await.len(),
            directory.pets.read().await.len(),
            directory.clinics.read().await.len()
        );
        Ok(directory)
    }

    pub async fn add_doctor(&self, id: Uuid, name: impl Into<String>) {
        self.doctors.write().await.insert(id, name.into());
    }

    pub async fn add_pet(&self, id: Uuid, name: impl Into<String>, owner_id: Uuid) {
        self.pets
            .write()
            .await
            .insert(id, PetRecord { name: name.into(), owner_id });
    }

    pub async fn add_clinic(&self, id: Uuid, name: impl Into<String>) {
        self.clinics.write().await.insert(id, name.into());
    }

    pub async fn remove_doctor(&self, id: Uuid) -> bool {
        self.doctors.write().await.remove(&id).is_some()
    }
}

#[async_trait]
impl EntityDirectory for InMemoryDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.doctors.read().await.contains_key(&doctor_id))
    }

    async fn pet_exists(&self, pet_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.pets.read().await.contains_key(&pet_id))
    }

    async fn clinic_exists(&self, clinic_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.clinics.read().await.contains_key(&clinic_id))
    }

    async fn pet_owner(&self, pet_id: Uuid) -> Result<Option<Uuid>, AppointmentError> {
        Ok(self.pets.read().await.get(&pet_id).map(|p| p.owner_id))
    }

    async fn display_names(
        &self,
        doctor_id: Uuid,
        pet_id: Uuid,
        clinic_id: Uuid,
    ) -> Result<DisplayNames, AppointmentError> {
        Ok(DisplayNames {
            doctor_name: self.doctors.read().await.get(&doctor_id).cloned(),
            pet_name: self.pets.read().await.get(&pet_id).map(|p| p.name.clone()),
            clinic_name: self.clinics.read().await.get(&clinic_id).cloned(),
        })
    }
}

// ==============================================================================
// SUPABASE DIRECTORY
// ==============================================================================

/// Reads the `doctors`, `pets` and `clinics` tables.
pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first_row(&self, table: &str, id: Uuid, select: &str) -> Result<Option<Value>, AppointmentError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select={}&limit=1", table, id, select);
        debug!("Directory lookup {} {}", table, id);

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.first_row(table, id, "id").await?.is_some())
    }
}

fn string_field(row: &Value, field: &str) -> Option<String> {
    row.get(field).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl EntityDirectory for SupabaseDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        self.exists("doctors", doctor_id).await
    }

    async fn pet_exists(&self, pet_id: Uuid) -> Result<bool, AppointmentError> {
        self.exists("pets", pet_id).await
    }

    async fn clinic_exists(&self, clinic_id: Uuid) -> Result<bool, AppointmentError> {
        self.exists("clinics", clinic_id).await
    }

    async fn pet_owner(&self, pet_id: Uuid) -> Result<Option<Uuid>, AppointmentError> {
        let row = self.first_row("pets", pet_id, "owner_id").await?;
        Ok(row
            .as_ref()
            .and_then(|r| string_field(r, "owner_id"))
            .and_then(|id| Uuid::parse_str(&id).ok()))
    }

    async fn display_names(
        &self,
        doctor_id: Uuid,
        pet_id: Uuid,
        clinic_id: Uuid,
    ) -> Result<DisplayNames, AppointmentError> {
        let (doctor, pet, clinic) = futures::try_join!(
            self.first_row("doctors", doctor_id, "first_name,last_name"),
            self.first_row("pets", pet_id, "name"),
            self.first_row("clinics", clinic_id, "name"),
        )?;

        let doctor_name = doctor.and_then(|row| {
            match (string_field(&row, "first_name"), string_field(&row, "last_name")) {
                (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
                (first, last) => first.or(last),
            }
        });

        Ok(DisplayNames {
            doctor_name,
            pet_name: pet.and_then(|row| string_field(&row, "name")),
            clinic_name: clinic.and_then(|row| string_field(&row, "name")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn seed_file_populates_directory() {
        let doctor = Uuid::new_v4();
        let pet = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let clinic = Uuid::new_v4();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "doctors": [{{"id": "{doctor}", "name": "Dr. Ada Vet"}}],
                "pets": [{{"id": "{pet}", "name": "Rex", "owner_id": "{owner}"}}],
                "clinics": [{{"id": "{clinic}", "name": "Downtown Clinic"}}]
            }}"#
        )
        .unwrap();

        let directory = InMemoryDirectory::from_seed_file(file.path()).await.unwrap();

        assert!(directory.doctor_exists(doctor).await.unwrap());
        assert!(!directory.doctor_exists(pet).await.unwrap());
        assert_eq!(directory.pet_owner(pet).await.unwrap(), Some(owner));

        let names = directory.display_names(doctor, pet, clinic).await.unwrap();
        assert_eq!(names.doctor_name.as_deref(), Some("Dr. Ada Vet"));
        assert_eq!(names.pet_name.as_deref(), Some("Rex"));
        assert_eq!(names.clinic_name.as_deref(), Some("Downtown Clinic"));
    }

    #[tokio::test]
    async fn malformed_seed_is_a_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = InMemoryDirectory::from_seed_file(file.path()).await;
        assert!(matches!(result, Err(AppointmentError::Validation(_))));
    }
}
