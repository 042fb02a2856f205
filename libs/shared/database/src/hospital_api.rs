use anyhow::Result;
use chrono::NaiveDate;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Non-success answers from the hospital backend. Returned inside
/// `anyhow::Error` so callers can `downcast_ref` when they care.
#[derive(Debug, thiserror::Error)]
pub enum HospitalApiError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {body}")]
    Status { status: StatusCode, body: String },
}

/// Filters understood by `GET /receptionist/appointments`.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilters {
    pub status: Option<String>,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
}

pub struct HospitalApiClient {
    client: Client,
    base_url: String,
    service_token: Option<String>,
}

impl HospitalApiClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.api_base_url().to_string(),
            service_token: config.hospital_api_token.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token.or(self.service_token.as_deref()) {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Bearer token contains invalid header characters, sending without it"),
            }
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str, auth_token: Option<&str>) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let headers = self.get_headers(auth_token);

        let response = self.client.request(method, &url)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => HospitalApiError::Auth(error_text),
                404 => HospitalApiError::NotFound(error_text),
                _ => HospitalApiError::Status { status, body: error_text },
            }.into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Raw appointment payload for one doctor on one day. The body is not
    /// shape-checked here; callers decide what a non-list answer means.
    pub async fn get_doctor_appointments_on_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Value> {
        let path = format!(
            "/receptionist/doctors/{}/appointments/{}",
            urlencoding::encode(doctor_id),
            date.format("%Y-%m-%d")
        );

        self.request::<Value>(Method::GET, &path, auth_token).await
    }

    pub async fn list_appointments(
        &self,
        filters: &AppointmentFilters,
        auth_token: Option<&str>,
    ) -> Result<Value> {
        let mut params = Vec::new();
        if let Some(status) = &filters.status {
            params.push(format!("status={}", urlencoding::encode(status)));
        }
        if let Some(doctor_id) = &filters.doctor_id {
            params.push(format!("doctorId={}", urlencoding::encode(doctor_id)));
        }
        if let Some(patient_id) = &filters.patient_id {
            params.push(format!("patientId={}", urlencoding::encode(patient_id)));
        }

        let path = if params.is_empty() {
            "/receptionist/appointments".to_string()
        } else {
            format!("/receptionist/appointments?{}", params.join("&"))
        };

        self.request::<Value>(Method::GET, &path, auth_token).await
    }
}
