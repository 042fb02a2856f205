use std::sync::Arc;
use serde_json::{json, Value};

use shared_config::AppConfig;

pub struct TestConfig {
    pub hospital_api_url: String,
    pub hospital_api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            hospital_api_url: "http://localhost:8080".to_string(),
            hospital_api_token: None,
            timeout_secs: 5,
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock backend, usually a wiremock `MockServer::uri()`.
    pub fn with_url(url: &str) -> Self {
        Self {
            hospital_api_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            hospital_api_url: self.hospital_api_url.clone(),
            hospital_api_timeout_secs: self.timeout_secs,
            hospital_api_token: self.hospital_api_token.clone(),
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct MockHospitalResponses;

impl MockHospitalResponses {
    /// One appointment as the receptionist endpoints return it.
    pub fn appointment(date_time: &str, duration: Option<u32>, status: &str) -> Value {
        let mut appointment = json!({
            "id": 1,
            "patientName": "Test Patient",
            "doctorName": "Dr. Test",
            "appointmentDateTime": date_time,
            "status": status,
            "type": "REGULAR",
            "notes": null
        });
        if let Some(minutes) = duration {
            appointment["duration"] = json!(minutes);
        }
        appointment
    }

    pub fn appointment_with(id: u64, patient: &str, doctor: &str, date_time: &str, status: &str) -> Value {
        json!({
            "id": id,
            "patientName": patient,
            "doctorName": doctor,
            "appointmentDateTime": date_time,
            "duration": 30,
            "status": status,
            "type": "REGULAR"
        })
    }

    pub fn error_response(message: &str) -> Value {
        json!({
            "message": message,
            "status": 500
        })
    }
}
