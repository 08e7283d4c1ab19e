#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Bind address for the Prometheus scrape endpoint, e.g. 0.0.0.0:9100.
    pub listen: String,

    /// Namespace prefix for every exported metric, e.g. "concierge".
    pub namespace: &'static str,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { listen: "0.0.0.0:9100".to_string(), namespace: "concierge" }
    }
}
