pub mod hospital_api;

pub use hospital_api::{HospitalApiClient, HospitalApiError};
