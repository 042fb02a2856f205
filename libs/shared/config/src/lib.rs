use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HOSPITAL_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub hospital_api_url: String,
    pub hospital_api_timeout_secs: u64,
    pub hospital_api_token: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            hospital_api_url: env::var("HOSPITAL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("HOSPITAL_API_URL not set, using default");
                    String::new()
                }),
            hospital_api_timeout_secs: env::var("HOSPITAL_API_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| match raw.parse::<u64>() {
                    Ok(secs) if secs > 0 => Some(secs),
                    _ => {
                        warn!("HOSPITAL_API_TIMEOUT_SECS is not a positive integer: {}", raw);
                        None
                    }
                })
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            hospital_api_token: env::var("HOSPITAL_API_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - falling back to {}", DEFAULT_HOSPITAL_API_URL);
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.hospital_api_url.is_empty()
    }

    /// Backend base URL without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        if self.hospital_api_url.is_empty() {
            DEFAULT_HOSPITAL_API_URL
        } else {
            self.hospital_api_url.trim_end_matches('/')
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.hospital_api_timeout_secs)
    }
}
