use metrics::{counter, histogram};

/// Metric names under: {ns}_fastpath_*
pub struct FastPathMetrics {
    ns: &'static str,
}

impl FastPathMetrics {
    pub fn new(namespace: &'static str) -> Self {
        Self { ns: namespace }
    }

    #[inline]
    pub fn dispatch(&self, action: &'static str, seconds: f64) {
        counter!(format!("{}_fastpath_dispatch_total", self.ns), "action" => action).increment(1);
        histogram!(format!("{}_fastpath_dispatch_seconds", self.ns)).record(seconds);
    }

    #[inline]
    pub fn no_match(&self) {
        counter!(format!("{}_fastpath_no_match_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn debounced(&self) {
        counter!(format!("{}_fastpath_debounced_total", self.ns)).increment(1);
    }
}
