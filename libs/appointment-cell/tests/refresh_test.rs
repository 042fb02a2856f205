// libs/appointment-cell/tests/refresh_test.rs
//
// Slot refresh coordination: generation tokens, stale result handling,
// selected-time clearing and error surfacing.

use std::collections::HashMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::Notify;

use appointment_cell::models::{AppointmentError, TimeOfDay};
use appointment_cell::services::directory::AppointmentDirectory;
use appointment_cell::services::refresh::{RefreshOutcome, SlotRefreshCoordinator};
use shared_database::hospital_api::AppointmentFilters;
use shared_utils::test_utils::MockHospitalResponses;

// ==============================================================================
// FAKE DIRECTORY
// ==============================================================================

#[derive(Default)]
struct FakeDirectory {
    responses: HashMap<String, Result<Value, AppointmentError>>,
    gates: HashMap<String, Arc<Notify>>,
}

impl FakeDirectory {
    fn with(mut self, doctor_id: &str, response: Result<Value, AppointmentError>) -> Self {
        self.responses.insert(doctor_id.to_string(), response);
        self
    }

    fn gated(mut self, doctor_id: &str, gate: Arc<Notify>) -> Self {
        self.gates.insert(doctor_id.to_string(), gate);
        self
    }
}

#[async_trait]
impl AppointmentDirectory for FakeDirectory {
    async fn appointments_for_doctor_on_date(
        &self,
        doctor_id: &str,
        _date: NaiveDate,
        _auth_token: Option<&str>,
    ) -> Result<Value, AppointmentError> {
        if let Some(gate) = self.gates.get(doctor_id) {
            gate.notified().await;
        }
        self.responses
            .get(doctor_id)
            .cloned()
            .unwrap_or_else(|| Ok(json!([])))
    }

    async fn list_appointments(
        &self,
        _filters: &AppointmentFilters,
        _auth_token: Option<&str>,
    ) -> Result<Value, AppointmentError> {
        Ok(json!([]))
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn time(raw: &str) -> TimeOfDay {
    raw.parse().unwrap()
}

fn booked_at(raw: &str) -> Value {
    MockHospitalResponses::appointment(&format!("2024-03-15T{}:00", raw), Some(30), "SCHEDULED")
}

fn coordinator(directory: FakeDirectory) -> Arc<SlotRefreshCoordinator> {
    Arc::new(SlotRefreshCoordinator::new(Arc::new(directory)))
}

// ==============================================================================
// TESTS
// ==============================================================================

#[tokio::test]
async fn test_refresh_applies_computed_slots() {
    let coord = coordinator(FakeDirectory::default().with("7", Ok(json!([booked_at("09:00")]))));

    let outcome = coord.refresh("7", date(), Some(30), None).await;

    let board = assert_matches!(outcome, RefreshOutcome::Applied(board) => board);
    assert_eq!(board.generation, 1);
    assert_eq!(board.doctor_id.as_deref(), Some("7"));
    assert_eq!(board.available_slots.len(), 15);
    assert!(!board.available_slots.contains(&time("09:00")));
    assert!(board.error_message.is_none());
    assert_eq!(coord.snapshot().await, board);
}

#[tokio::test]
async fn test_generations_increase_monotonically() {
    let coord = coordinator(FakeDirectory::default());
    let first = coord.begin();
    let second = coord.begin();

    assert!(second > first);
    assert!(coord.is_current(second));
    assert!(!coord.is_current(first));
}

#[tokio::test]
async fn test_older_result_is_discarded() {
    let coord = coordinator(FakeDirectory::default());
    let older = coord.begin();
    let newer = coord.begin();

    let applied = coord
        .apply(newer, "8", date(), Some(30), Ok(appointment_cell::compute_slots(&[], Some(30))))
        .await;
    assert_matches!(applied, RefreshOutcome::Applied(_));

    let stale = coord
        .apply(older, "7", date(), Some(30), Err(AppointmentError::DoctorNotFound))
        .await;
    assert_eq!(stale, RefreshOutcome::Stale { generation: older, latest: newer });

    let board = coord.snapshot().await;
    assert_eq!(board.doctor_id.as_deref(), Some("8"));
    assert!(board.error_message.is_none());
}

#[tokio::test]
async fn test_slow_fetch_loses_to_newer_selection() {
    let gate = Arc::new(Notify::new());
    let directory = FakeDirectory::default()
        .with("slow", Ok(json!([])))
        .with("fast", Ok(json!([booked_at("10:00")])))
        .gated("slow", gate.clone());
    let coord = coordinator(directory);

    let slow = {
        let coord = coord.clone();
        tokio::spawn(async move { coord.refresh("slow", date(), Some(30), None).await })
    };

    while coord.latest_generation() < 1 {
        tokio::task::yield_now().await;
    }

    let fast = coord.refresh("fast", date(), Some(30), None).await;
    assert_matches!(fast, RefreshOutcome::Applied(_));

    gate.notify_one();
    let slow = slow.await.unwrap();
    assert_matches!(slow, RefreshOutcome::Stale { generation: 1, latest: 2 });

    let board = coord.snapshot().await;
    assert_eq!(board.doctor_id.as_deref(), Some("fast"));
    assert!(!board.available_slots.contains(&time("10:00")));
}

#[tokio::test]
async fn test_selected_time_cleared_when_no_longer_free() {
    let coord = coordinator(
        FakeDirectory::default()
            .with("7", Ok(json!([])))
            .with("8", Ok(json!([booked_at("11:00")]))),
    );

    coord.refresh("7", date(), Some(30), None).await;
    coord.select_time(time("11:00")).await.unwrap();
    assert_eq!(coord.snapshot().await.selected_time, Some(time("11:00")));

    coord.refresh("8", date(), Some(30), None).await;
    assert_eq!(coord.snapshot().await.selected_time, None);
}

#[tokio::test]
async fn test_selected_time_kept_when_still_free() {
    let coord = coordinator(FakeDirectory::default().with("7", Ok(json!([booked_at("09:00")]))));

    coord.refresh("7", date(), Some(30), None).await;
    coord.select_time(time("14:00")).await.unwrap();

    coord.refresh("7", date(), Some(60), None).await;
    let board = coord.snapshot().await;
    assert_eq!(board.selected_time, Some(time("14:00")));
    assert_eq!(board.duration_minutes, 60);
}

#[tokio::test]
async fn test_selecting_unavailable_time_is_rejected() {
    let coord = coordinator(FakeDirectory::default().with("7", Ok(json!([booked_at("09:00")]))));
    coord.refresh("7", date(), None, None).await;

    let err = coord.select_time(time("09:00")).await.unwrap_err();
    assert_eq!(err, AppointmentError::SlotNotAvailable(time("09:00")));
}

#[tokio::test]
async fn test_fetch_failure_clears_slots_and_shows_message() {
    let coord = coordinator(
        FakeDirectory::default()
            .with("7", Ok(json!([])))
            .with("9", Err(AppointmentError::DirectoryUnavailable("timeout".to_string()))),
    );

    coord.refresh("7", date(), Some(30), None).await;
    coord.select_time(time("09:30")).await.unwrap();

    coord.refresh("9", date(), Some(30), None).await;
    let board = coord.snapshot().await;
    assert!(board.available_slots.is_empty());
    assert!(board.selected_time.is_none());
    assert_eq!(
        board.error_message.as_deref(),
        Some("Failed to check doctor availability. Please try again.")
    );
}

#[tokio::test]
async fn test_malformed_payload_shows_load_message() {
    let coord = coordinator(FakeDirectory::default().with("7", Ok(json!({ "error": "oops" }))));

    coord.refresh("7", date(), Some(30), None).await;
    let board = coord.snapshot().await;
    assert!(board.available_slots.is_empty());
    assert_eq!(
        board.error_message.as_deref(),
        Some("Failed to load doctor appointments. Please try again.")
    );
}

#[tokio::test]
async fn test_success_after_error_clears_message() {
    let coord = coordinator(
        FakeDirectory::default()
            .with("9", Err(AppointmentError::Unauthorized))
            .with("7", Ok(json!([]))),
    );

    coord.refresh("9", date(), Some(30), None).await;
    assert!(coord.snapshot().await.error_message.is_some());

    coord.refresh("7", date(), Some(30), None).await;
    let board = coord.snapshot().await;
    assert!(board.error_message.is_none());
    assert_eq!(board.available_slots.len(), 16);
}
