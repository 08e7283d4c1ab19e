use metrics::{counter, histogram};

use crate::labels::LabelPolicy;

/// Metric names under: {ns}_device_*
pub struct DeviceMetrics {
    ns: &'static str,
    policy: LabelPolicy,
}

impl DeviceMetrics {
    pub fn new(namespace: &'static str, policy: LabelPolicy) -> Self {
        Self { ns: namespace, policy }
    }

    #[inline]
    pub fn request(&self, host: &str, port: u16, outcome: &'static str, seconds: f64) {
        let bucket = self.policy.device_bucket(host, port);
        counter!(
            format!("{}_device_requests_total", self.ns),
            "device" => bucket.as_str().to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!(format!("{}_device_request_seconds", self.ns)).record(seconds);
    }

    #[inline]
    pub fn auth_failure(&self) {
        counter!(format!("{}_device_auth_failures_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn door_open(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!(format!("{}_device_door_open_total", self.ns), "outcome" => outcome).increment(1);
    }

    #[inline]
    pub fn credential_provisioned(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        counter!(format!("{}_device_credential_provision_total", self.ns), "outcome" => outcome).increment(1);
    }

    #[inline]
    pub fn client_cache_miss(&self) {
        counter!(format!("{}_device_client_cache_misses_total", self.ns)).increment(1);
    }
}
