use std::time::Duration;

/// Per-deployment tuning for the voice bridge (spec §6 "voice …" options).
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub realtime_url: String,
    pub realtime_model: String,
    pub realtime_api_key: String,
    pub default_voice: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
    pub noise_gate_threshold: i32,
    pub playback_prebuffer_frames: usize,
    pub output_audio_queue_maxsize: usize,
    pub guard_extension: String,
    pub barge_in_grace: Duration,
    pub demo_mode: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            realtime_api_key: String::new(),
            default_voice: "alloy".to_string(),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
            noise_gate_threshold: 0,
            playback_prebuffer_frames: 10,
            output_audio_queue_maxsize: 1000,
            guard_extension: "1002".to_string(),
            barge_in_grace: Duration::from_millis(500),
            demo_mode: true,
        }
    }
}

pub const DEFAULT_ASTERISK_SAMPLE_RATE: u32 = 8000;
pub const DEFAULT_CHUNK_MS: u32 = 20;
pub const OPENAI_SAMPLE_RATE: u32 = 24000;
pub const BYTES_PER_SAMPLE: usize = 2;
