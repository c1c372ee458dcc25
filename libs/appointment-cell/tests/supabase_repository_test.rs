use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::EntityKind;
use appointment_cell::services::{AppointmentFilter, PageRequest};
use appointment_cell::{
    Appointment, AppointmentError, AppointmentRepository, AppointmentStatus, EntityDirectory,
    SupabaseAppointmentRepository, SupabaseDirectory,
};
use shared_database::SupabaseClient;
use shared_utils::test_utils::MockSupabaseResponses;

fn client(server: &MockServer) -> Arc<SupabaseClient> {
    Arc::new(SupabaseClient::with_key(&server.uri(), "service-key"))
}

fn appointment() -> Appointment {
    let start = Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
    Appointment {
        id: Uuid::new_v4(),
        doctor_id: Uuid::new_v4(),
        pet_id: Uuid::new_v4(),
        clinic_id: Uuid::new_v4(),
        start_time: start,
        duration_minutes: 30,
        status: AppointmentStatus::Pending,
        reason: None,
        notes: None,
        created_at: start,
        updated_at: start,
    }
}

#[tokio::test]
async fn exclusion_violation_is_slot_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "23P01",
            "conflicting key value violates exclusion constraint \"appointments_no_overlap\"",
        )))
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    assert_matches!(
        repository.insert(appointment()).await,
        Err(AppointmentError::SlotUnavailable(_))
    );
}

#[tokio::test]
async fn serialization_failure_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "40001",
            "could not serialize access due to concurrent update",
        )))
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    let err = repository.insert(appointment()).await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn day_lookup_filters_by_doctor_and_parses_legacy_status() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param(
            "and",
            "(start_time.gte.2025-06-02T00:00:00Z,start_time.lt.2025-06-03T00:00:00Z)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(id, doctor, "2025-06-02T10:00:00Z", "scheduled")
        ])))
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    let rows = repository
        .find_by_doctor_and_day(doctor, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn query_reads_total_from_content_range() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "count=exact"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param("order", "start_time.asc,id.asc"))
        .and(query_param("offset", "2"))
        .and(query_param("limit", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "2-3/9")
                .set_body_json(json!([
                    MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor, "2025-06-02T10:00:00Z", "pending"),
                    MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor, "2025-06-02T11:00:00Z", "approved"),
                ])),
        )
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    let page = repository
        .query(&AppointmentFilter::new().doctor(doctor), PageRequest::new(2, 2).unwrap())
        .await
        .unwrap();

    assert_eq!(page.total_count, 9);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[1].status, AppointmentStatus::Approved);
}

#[tokio::test]
async fn query_past_last_page_is_empty_with_total() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("offset", "8"))
        .and(query_param("limit", "4"))
        .respond_with(
            ResponseTemplate::new(416)
                .insert_header("content-range", "*/7")
                .set_body_json(json!({
                    "code": "PGRST103",
                    "message": "Requested range not satisfiable",
                    "details": "An offset of 8 was requested, but there are only 7 rows.",
                    "hint": null
                })),
        )
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    let page = repository
        .query(&AppointmentFilter::new().doctor(doctor), PageRequest::new(3, 4).unwrap())
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 7);
    assert_eq!(page.page_index, 3);
}

#[tokio::test]
async fn status_query_matches_legacy_literals() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(pending,scheduled,Scheduled,Pending)"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-1/2")
                .set_body_json(json!([
                    MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor, "2025-06-02T10:00:00Z", "pending"),
                    MockSupabaseResponses::appointment_row(Uuid::new_v4(), doctor, "2025-06-02T11:00:00Z", "scheduled"),
                ])),
        )
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    let page = repository
        .query(
            &AppointmentFilter::new().status(AppointmentStatus::Pending),
            PageRequest::new(1, 10).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(page.total_count, 2);
    assert!(page.items.iter().all(|a| a.status == AppointmentStatus::Pending));
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    assert_matches!(
        repository.update(appointment()).await,
        Err(AppointmentError::NotFound { entity: EntityKind::Appointment, .. })
    );
}

#[tokio::test]
async fn server_errors_are_database_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let repository = SupabaseAppointmentRepository::new(client(&server));
    let err = repository.find_by_id(Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, AppointmentError::Database(_));
    assert!(!err.is_expected());
}

#[tokio::test]
async fn directory_resolves_owner_and_names() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    let pet = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let clinic = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .and(query_param("select", "owner_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "owner_id": owner }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .and(query_param("select", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "Rex" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "first_name": "Ada", "last_name": "Vet" }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let directory = SupabaseDirectory::new(client(&server));

    assert_eq!(directory.pet_owner(pet).await.unwrap(), Some(owner));
    assert!(!directory.clinic_exists(clinic).await.unwrap());

    let names = directory.display_names(doctor, pet, clinic).await.unwrap();
    assert_eq!(names.doctor_name.as_deref(), Some("Ada Vet"));
    assert_eq!(names.pet_name.as_deref(), Some("Rex"));
    assert_eq!(names.clinic_name, None);
}
