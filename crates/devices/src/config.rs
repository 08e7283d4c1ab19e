use std::time::Duration;

/// Per-device connection settings (spec §6 "Environment/config").
#[derive(Clone, Debug)]
pub struct AccessDeviceConfig {
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl Default for AccessDeviceConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: String::new(),
            timeout: Duration::from_secs_f64(3.0),
        }
    }
}

/// Tuning for the fast-path dispatcher (spec §4.6).
#[derive(Clone, Debug)]
pub struct FastPathConfig {
    pub open_timeout: Duration,
    pub debounce: Duration,
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs_f64(1.5),
            debounce: Duration::from_secs_f64(4.0),
        }
    }
}
