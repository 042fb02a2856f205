use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::hospital_api::AppointmentFilters;
use shared_models::error::AppError;
use shared_utils::listing::{ListQuery, SortDirection, DEFAULT_PAGE_SIZE};

use crate::models::{minutes_from_value, AppointmentError, AppointmentRecord, ComputeSlotsRequest};
use crate::services::{
    availability::SlotAvailabilityCalculator,
    directory::{AppointmentDirectory, HttpAppointmentDirectory},
};

const MAX_PAGE_SIZE: usize = 100;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: String,
    /// Kept as text: anything that is not a positive integer means 30 minutes.
    pub duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<SortDirection>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

fn bearer_token(auth: &Option<TypedHeader<Authorization<Bearer>>>) -> Option<&str> {
    auth.as_ref().map(|TypedHeader(header)| header.token())
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppointmentError::InvalidDate(raw.to_string()))
}

fn parse_duration(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse().ok())
}

// ==============================================================================
// SLOT AVAILABILITY HANDLERS
// ==============================================================================

/// Open start times for a doctor on a date, fetched from the hospital backend.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailableSlotsQuery>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date(&query.date)?;
    let requested_duration = parse_duration(query.duration.as_deref());

    let directory = HttpAppointmentDirectory::new(&state);
    let payload = directory
        .appointments_for_doctor_on_date(&doctor_id, date, bearer_token(&auth))
        .await?;

    let computation = SlotAvailabilityCalculator::default()
        .compute_from_json(&payload, requested_duration)?;

    if computation.fallback {
        warn!(
            "Serving default slot grid for doctor {} on {} after an empty computation",
            doctor_id, date
        );
    }

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": date,
        "duration_minutes": computation.duration_minutes,
        "available_slots": computation.available_slots,
        "fallback": computation.fallback,
        "skipped_records": computation.skipped_records,
        "active_appointments": computation.active_appointments,
    })))
}

/// Computes slots for an appointment list supplied by the caller.
#[axum::debug_handler]
pub async fn compute_slots(
    Json(request): Json<ComputeSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let requested_duration = request.duration.as_ref().and_then(minutes_from_value);

    let computation = SlotAvailabilityCalculator::default()
        .compute_from_json(&request.appointments, requested_duration)
        .map_err(|e| match e {
            AppointmentError::MalformedCollection(_) => AppError::ValidationError(e.to_string()),
            other => other.into(),
        })?;

    Ok(Json(json!(computation)))
}

// ==============================================================================
// APPOINTMENT DIRECTORY HANDLERS
// ==============================================================================

/// Searchable, sortable, paginated appointment list.
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentListQuery>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    let filters = AppointmentFilters {
        status: query.status.clone(),
        doctor_id: query.doctor_id.clone(),
        patient_id: query.patient_id.clone(),
    };

    let directory = HttpAppointmentDirectory::new(&state);
    let payload = directory.list_appointments(&filters, bearer_token(&auth)).await?;

    let items = payload
        .as_array()
        .ok_or_else(|| AppointmentError::MalformedCollection("appointment list".to_string()))?;

    let records: Vec<AppointmentRecord> = items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect();

    if records.len() < items.len() {
        warn!("Skipped {} undecodable appointments", items.len() - records.len());
    }

    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let mut list_query = ListQuery::new(page_size)
        .with_search(query.search.as_deref().unwrap_or_default())
        .with_filter("status", query.status.as_deref());

    if let Some(sort) = query.sort.as_deref() {
        list_query.set_sort(sort, query.direction.unwrap_or_default());
    }
    list_query.set_page(query.page.unwrap_or(1));

    let page = list_query.apply(&records);
    debug!("Returning appointment page {}/{}", page.page, page.total_pages);

    Ok(Json(json!(page)))
}
