use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveTime;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::{ScheduleCalendar, ScheduleError, ScheduleRepository, SupabaseScheduleRepository};
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::MockSupabaseResponses;

fn repository(server: &MockServer) -> SupabaseScheduleRepository {
    SupabaseScheduleRepository::new(Arc::new(SupabaseClient::with_key(
        &server.uri(),
        "service-key",
    )))
}

#[tokio::test]
async fn find_entry_queries_doctor_and_day() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    let entry_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param("day_of_week", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_row(entry_id, doctor, 1, "09:00:00", "17:00:00")
        ])))
        .mount(&server)
        .await;

    let entry = repository(&server).find_entry(doctor, 1).await.unwrap().unwrap();
    assert_eq!(entry.id, entry_id);
    assert_eq!(entry.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(entry.end_time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
}

#[tokio::test]
async fn unique_violation_on_insert_is_a_conflict() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    // Early lookup sees nothing; the concurrent writer wins at the index.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "23505",
                "duplicate key value violates unique constraint",
            ),
        ))
        .mount(&server)
        .await;

    let calendar = ScheduleCalendar::new(Arc::new(repository(&server)));
    let result = calendar
        .add_entry(
            doctor,
            1,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
        .await;

    assert_matches!(result, Err(ScheduleError::Conflict { day_of_week: 1, .. }));
}

#[tokio::test]
async fn deleting_missing_entry_reports_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let calendar = ScheduleCalendar::new(Arc::new(repository(&server)));
    let missing = Uuid::new_v4();

    assert_matches!(
        calendar.remove_entry(missing).await,
        Err(ScheduleError::NotFound(id)) if id == missing
    );
}

#[tokio::test]
async fn server_errors_surface_as_database_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let result = repository(&server).find_entry(Uuid::new_v4(), 3).await;
    assert_matches!(result, Err(ScheduleError::Database(_)));
}
