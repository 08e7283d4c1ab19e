/// Tuning knobs for the QR credential lifecycle that are not per-request
/// input but still vary per deployment (spec §6 "Environment/config").
#[derive(Clone, Debug)]
pub struct QrConfig {
    /// Digit width of the numeric `card_no` provisioned into biometric
    /// readers. Default 10, matching the original implementation.
    pub card_digits: u8,
    /// Prefix prepended to the first 10 hex chars of the visitor id to
    /// form `employee_no`. Default "V".
    pub employee_prefix: String,
    /// How many fresh `card_no` values to try before giving up (spec §4.5
    /// step 4). Fixed at 10 by spec; kept configurable for tests.
    pub card_no_max_attempts: u8,
    /// Tenant-local timezone used to render device-facing timestamps.
    /// Default America/Costa_Rica.
    pub default_timezone: String,
    /// Public base URL used to build `token_url` in `IssueQrResponse`.
    pub public_base_url: String,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            card_digits: 10,
            employee_prefix: "V".to_string(),
            card_no_max_attempts: 10,
            default_timezone: "America/Costa_Rica".to_string(),
            public_base_url: "https://concierge.example".to_string(),
        }
    }
}
