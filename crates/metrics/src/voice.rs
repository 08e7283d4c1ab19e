use metrics::{counter, histogram};

/// Metric names under: {ns}_voice_*
pub struct VoiceMetrics {
    ns: &'static str,
}

impl VoiceMetrics {
    pub fn new(namespace: &'static str) -> Self {
        Self { ns: namespace }
    }

    #[inline]
    pub fn call_started(&self) {
        counter!(format!("{}_voice_calls_started_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn call_ended(&self, duration_seconds: f64) {
        counter!(format!("{}_voice_calls_ended_total", self.ns)).increment(1);
        histogram!(format!("{}_voice_call_duration_seconds", self.ns)).record(duration_seconds);
    }

    #[inline]
    pub fn barge_in(&self, accepted: bool) {
        let label = if accepted { "accepted" } else { "suppressed" };
        counter!(format!("{}_voice_barge_in_total", self.ns), "outcome" => label).increment(1);
    }

    #[inline]
    pub fn playout_drift_correction(&self) {
        counter!(format!("{}_voice_playout_drift_corrections_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn playout_silence_inserted(&self) {
        counter!(format!("{}_voice_playout_silence_frames_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn input_audio_dropped(&self) {
        counter!(format!("{}_voice_input_audio_dropped_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn tool_call(&self, name: &'static str) {
        counter!(format!("{}_voice_tool_calls_total", self.ns), "tool" => name).increment(1);
    }

    #[inline]
    pub fn tool_error(&self, name: &'static str) {
        counter!(format!("{}_voice_tool_errors_total", self.ns), "tool" => name).increment(1);
    }
}
