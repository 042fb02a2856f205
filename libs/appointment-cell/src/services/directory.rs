use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_database::hospital_api::{AppointmentFilters, HospitalApiClient, HospitalApiError};

use crate::models::AppointmentError;

/// Source of existing appointments. Payloads are returned raw so that the
/// caller can tell a malformed collection apart from a failed request.
#[async_trait]
pub trait AppointmentDirectory: Send + Sync {
    async fn appointments_for_doctor_on_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Value, AppointmentError>;

    async fn list_appointments(
        &self,
        filters: &AppointmentFilters,
        auth_token: Option<&str>,
    ) -> Result<Value, AppointmentError>;
}

/// Appointment directory backed by the hospital REST API.
pub struct HttpAppointmentDirectory {
    client: HospitalApiClient,
}

impl HttpAppointmentDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: HospitalApiClient::new(config),
        }
    }
}

fn map_api_error(err: anyhow::Error) -> AppointmentError {
    match err.downcast_ref::<HospitalApiError>() {
        Some(HospitalApiError::Auth(_)) => AppointmentError::Unauthorized,
        Some(HospitalApiError::NotFound(_)) => AppointmentError::DoctorNotFound,
        _ => {
            error!("Appointment directory request failed: {}", err);
            AppointmentError::DirectoryUnavailable(err.to_string())
        }
    }
}

#[async_trait]
impl AppointmentDirectory for HttpAppointmentDirectory {
    async fn appointments_for_doctor_on_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Value, AppointmentError> {
        debug!("Fetching appointments for doctor {} on {}", doctor_id, date);

        self.client
            .get_doctor_appointments_on_date(doctor_id, date, auth_token)
            .await
            .map_err(map_api_error)
    }

    async fn list_appointments(
        &self,
        filters: &AppointmentFilters,
        auth_token: Option<&str>,
    ) -> Result<Value, AppointmentError> {
        debug!("Listing appointments with filters {:?}", filters);

        self.client
            .list_appointments(filters, auth_token)
            .await
            .map_err(map_api_error)
    }
}
