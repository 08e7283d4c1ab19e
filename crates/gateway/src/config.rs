use clap::Parser;

/// Every knob spec §6 "Environment/config" calls out, wired through clap's
/// `env` fallback the way the teacher's `vp-gateway::Config` does.
#[derive(Parser, Debug, Clone)]
#[command(name = "concierge-gateway", about = "Virtual-concierge telephony and access gateway")]
pub struct Config {
    /// Telephony stream listener (spec §4.1 transport).
    #[arg(long, env = "CONCIERGE_TELEPHONY_LISTEN", default_value = "0.0.0.0:7070")]
    pub telephony_listen: String,

    /// QR/access HTTP surface (spec §4.5, §4.6).
    #[arg(long, env = "CONCIERGE_HTTP_LISTEN", default_value = "0.0.0.0:8080")]
    pub http_listen: String,

    #[arg(long, env = "CONCIERGE_METRICS_LISTEN", default_value = "0.0.0.0:9100")]
    pub metrics_listen: String,

    #[arg(long, env = "CONCIERGE_DATABASE_URL")]
    pub database_url: String,

    /// This deployment's condominium (spec §2 Tenant). Every other tenant
    /// row the shared schema may hold belongs to a different gateway
    /// process; the voice bridge only ever serves this one.
    #[arg(long, env = "CONCIERGE_TENANT_ID")]
    pub tenant_id: uuid::Uuid,

    #[arg(long, env = "CONCIERGE_TENANT_LABEL", default_value = "el condominio")]
    pub tenant_label: String,

    #[arg(long, env = "CONCIERGE_DEFAULT_TIMEZONE", default_value = "America/Costa_Rica")]
    pub default_timezone: String,

    /// Seconds between refreshes of the in-memory device/tenant cache.
    #[arg(long, env = "CONCIERGE_DEVICE_MAP_REFRESH_S", default_value_t = 30)]
    pub device_map_refresh_s: u64,

    // --- access devices ---
    #[arg(long, env = "CONCIERGE_DEVICE_USERNAME", default_value = "admin")]
    pub device_username: String,

    #[arg(long, env = "CONCIERGE_DEVICE_PASSWORD", default_value = "")]
    pub device_password: String,

    #[arg(long, env = "CONCIERGE_DEVICE_TIMEOUT_S", default_value_t = 3.0)]
    pub device_timeout_s: f64,

    #[arg(long, env = "CONCIERGE_FASTPATH_OPEN_TIMEOUT_S", default_value_t = 1.5)]
    pub fastpath_open_timeout_s: f64,

    #[arg(long, env = "CONCIERGE_FASTPATH_DEBOUNCE_S", default_value_t = 4.0)]
    pub fastpath_debounce_s: f64,

    // --- QR lifecycle ---
    #[arg(long, env = "CONCIERGE_CARD_DIGITS", default_value_t = 10)]
    pub card_digits: u8,

    #[arg(long, env = "CONCIERGE_EMPLOYEE_PREFIX", default_value = "V")]
    pub employee_prefix: String,

    #[arg(long, env = "CONCIERGE_PUBLIC_BASE_URL", default_value = "https://concierge.example")]
    pub public_base_url: String,

    // --- voice bridge / realtime model ---
    #[arg(long, env = "CONCIERGE_REALTIME_URL", default_value = "wss://api.openai.com/v1/realtime")]
    pub realtime_url: String,

    #[arg(long, env = "CONCIERGE_REALTIME_MODEL", default_value = "gpt-4o-realtime-preview")]
    pub realtime_model: String,

    #[arg(long, env = "CONCIERGE_REALTIME_API_KEY", default_value = "")]
    pub realtime_api_key: String,

    #[arg(long, env = "CONCIERGE_VOICE_NAME", default_value = "alloy")]
    pub voice_name: String,

    #[arg(long, env = "CONCIERGE_VAD_THRESHOLD", default_value_t = 0.5)]
    pub vad_threshold: f32,

    #[arg(long, env = "CONCIERGE_VAD_PREFIX_PADDING_MS", default_value_t = 300)]
    pub vad_prefix_padding_ms: u32,

    #[arg(long, env = "CONCIERGE_VAD_SILENCE_DURATION_MS", default_value_t = 500)]
    pub vad_silence_duration_ms: u32,

    /// RMS threshold below which input telephony audio is replaced with
    /// silence before reaching the model. 0 disables the gate.
    #[arg(long, env = "CONCIERGE_NOISE_GATE_THRESHOLD", default_value_t = 0)]
    pub noise_gate_threshold: i32,

    #[arg(long, env = "CONCIERGE_PLAYBACK_PREBUFFER_FRAMES", default_value_t = 10)]
    pub playback_prebuffer_frames: usize,

    #[arg(long, env = "CONCIERGE_OUTPUT_QUEUE_MAXSIZE", default_value_t = 1000)]
    pub output_audio_queue_maxsize: usize,

    #[arg(long, env = "CONCIERGE_GUARD_EXTENSION", default_value = "1002")]
    pub guard_extension: String,

    #[arg(long, env = "CONCIERGE_DEMO_MODE", default_value_t = true)]
    pub demo_mode: bool,
}
