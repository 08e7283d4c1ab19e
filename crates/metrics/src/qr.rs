use metrics::counter;

/// Metric names under: {ns}_qr_*
pub struct QrMetrics {
    ns: &'static str,
}

impl QrMetrics {
    pub fn new(namespace: &'static str) -> Self {
        Self { ns: namespace }
    }

    #[inline]
    pub fn issued(&self) {
        counter!(format!("{}_qr_issued_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn consumed(&self) {
        counter!(format!("{}_qr_consumed_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn revoked(&self) {
        counter!(format!("{}_qr_revoked_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn scan_denied(&self, reason: &'static str) {
        counter!(format!("{}_qr_scan_denied_total", self.ns), "reason" => reason).increment(1);
    }

    #[inline]
    pub fn provisioning_fanout(&self, device_count: usize) {
        counter!(format!("{}_qr_provisioning_devices_total", self.ns)).increment(device_count as u64);
    }
}
