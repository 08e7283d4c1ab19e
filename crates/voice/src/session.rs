//! `CallSession`: owns one call's audio pipeline, realtime-model
//! connection, and tool loop (spec §4.1 "Per-session lifecycle").

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use concierge_core::ids::TenantId;

use crate::audio::dsp::apply_noise_gate;
use crate::audio::playout::{AudioSink, PlayoutLoop, PlayoutQueue};
use crate::audio::resample::RateConverter;
use crate::config::{VoiceConfig, BYTES_PER_SAMPLE, DEFAULT_ASTERISK_SAMPLE_RATE, DEFAULT_CHUNK_MS, OPENAI_SAMPLE_RATE};
use crate::realtime::{InboundEvent, RealtimeModelClient};
use crate::telephony::bridge::TelephonyChannel;
use crate::tools::{tool_catalog, ToolContext, ToolRuntime};

struct SessionState {
    asterisk_sample_rate: u32,
    chunk_bytes: usize,
    resampler_to_model: RateConverter,
    resampler_to_telephony: RateConverter,
}

impl SessionState {
    fn new(asterisk_sample_rate: u32, chunk_ms: u64) -> Self {
        let chunk_bytes = (asterisk_sample_rate as u64 * chunk_ms / 1000) as usize * BYTES_PER_SAMPLE;
        let model_chunk_samples = (asterisk_sample_rate as u64 * chunk_ms / 1000) as usize;
        Self {
            asterisk_sample_rate,
            chunk_bytes,
            resampler_to_model: RateConverter::new(asterisk_sample_rate, OPENAI_SAMPLE_RATE, model_chunk_samples.max(1)),
            resampler_to_telephony: RateConverter::new(
                OPENAI_SAMPLE_RATE,
                asterisk_sample_rate,
                (OPENAI_SAMPLE_RATE as u64 * chunk_ms / 1000) as usize,
            ),
        }
    }
}

pub struct CallSession {
    pub channel_id: Uuid,
    pub caller_id: String,
    pub tenant: TenantId,
    pub tenant_label: String,
    pub guard_extension: String,
    cfg: VoiceConfig,
    tools: Arc<ToolRuntime>,
    chunk_ms: u64,

    state: Mutex<SessionState>,
    playout_queue: Arc<PlayoutQueue>,
    ai_speaking: AtomicBool,
    last_ai_audio_at: Mutex<Instant>,
    detected_sample_rate: AtomicBool,
    noise_gate_hits: AtomicU64,
}

impl CallSession {
    pub fn new(
        channel_id: Uuid,
        caller_id: String,
        tenant: TenantId,
        tenant_label: String,
        guard_extension: String,
        cfg: VoiceConfig,
        tools: Arc<ToolRuntime>,
    ) -> Arc<Self> {
        let chunk_ms = DEFAULT_CHUNK_MS as u64;
        let queue_capacity = cfg.output_audio_queue_maxsize;
        Arc::new(Self {
            channel_id,
            caller_id,
            tenant,
            tenant_label,
            guard_extension,
            cfg,
            tools,
            chunk_ms,
            state: Mutex::new(SessionState::new(DEFAULT_ASTERISK_SAMPLE_RATE, chunk_ms)),
            playout_queue: Arc::new(PlayoutQueue::new(queue_capacity)),
            ai_speaking: AtomicBool::new(false),
            last_ai_audio_at: Mutex::new(Instant::now() - Duration::from_secs(3600)),
            detected_sample_rate: AtomicBool::new(false),
            noise_gate_hits: AtomicU64::new(0),
        })
    }

    fn system_prompt(&self) -> String {
        format!(
            "Eres un agente de seguridad virtual para el condominio \"{tenant}\". Saluda, identifica al \
             visitante y su destino (residente o unidad), revisa si hay autorización previa con \
             check_preauthorized_visitor, y si no la hay pide autorización con request_authorization antes de \
             abrir. Usa open_gate solo tras confirmar autorización. Si la situación es sospechosa, una \
             emergencia, o el visitante lo pide, usa transfer_to_guard (extensión {guard}). Registra el \
             resultado con log_visit. Nunca reveles datos personales de los residentes. Habla español natural \
             y sé breve.",
            tenant = self.tenant_label,
            guard = self.guard_extension,
        )
    }

    async fn configure_session(&self, client: &RealtimeModelClient) -> anyhow::Result<()> {
        let config = json!({
            "type": "session.update",
            "session": {
                "modalities": ["text", "audio"],
                "instructions": self.system_prompt(),
                "voice": self.cfg.default_voice,
                "input_audio_format": "pcm16",
                "output_audio_format": "pcm16",
                "input_audio_transcription": {"model": "whisper-1"},
                "turn_detection": {
                    "type": "server_vad",
                    "threshold": self.cfg.vad_threshold,
                    "prefix_padding_ms": self.cfg.vad_prefix_padding_ms,
                    "silence_duration_ms": self.cfg.vad_silence_duration_ms,
                },
                "tools": tool_catalog(),
                "tool_choice": "auto",
            }
        });
        client.send_json(config)?;
        info!(channel_id = %self.channel_id, "realtime session configured");
        Ok(())
    }

    /// Drives the call until the model socket closes or the telephony
    /// connection is cancelled (spec §4.1 "Active" / "Draining").
    pub async fn start(self: Arc<Self>, channel: TelephonyChannel) -> anyhow::Result<()> {
        let TelephonyChannel { call_id, sink, audio_in, cancel, .. } = channel;
        debug_assert_eq!(call_id, self.channel_id);

        let (client, mut events_rx) = RealtimeModelClient::connect(&self.cfg).await?;
        self.configure_session(&client).await?;
        let client = Arc::new(client);

        let listener = {
            let this = self.clone();
            let client = client.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    if cancel.is_cancelled() {
                        break;
                    }
                    this.handle_event(event, &client).await;
                }
                cancel.cancel();
            })
        };

        let streamer = {
            let this = self.clone();
            let client = client.clone();
            let sink = sink.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        frame = audio_in.pop() => {
                            this.stream_to_model(frame, &client, &sink).await;
                        }
                    }
                }
            })
        };

        let playout = {
            let queue = self.playout_queue.clone();
            let chunk_ms = self.chunk_ms;
            let prebuffer_frames = self.cfg.playback_prebuffer_frames;
            let chunk_bytes = self.state.lock().await.chunk_bytes;
            let sink = sink.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let pl = PlayoutLoop { queue, chunk_bytes, chunk_ms, prebuffer_frames };
                pl.run(&sink, &cancel).await
            })
        };

        let _ = listener.await;
        cancel.cancel();
        let _ = streamer.await;
        let stats = playout.await.unwrap_or_default();
        info!(channel_id = %self.channel_id, chunks_sent = stats.chunks_sent, drift_corrections = stats.drift_corrections, "call session ended");

        match Arc::try_unwrap(client) {
            Ok(client) => client.close().await,
            Err(_) => warn!(channel_id = %self.channel_id, "realtime client still referenced at session end"),
        }
        Ok(())
    }

    async fn stream_to_model(&self, frame: Vec<u8>, client: &RealtimeModelClient, sink: &crate::telephony::bridge::TelephonyConnection) {
        if !self.detected_sample_rate.load(Ordering::Acquire) {
            self.detect_sample_rate(&frame, sink).await;
        }

        let (gated, hit) = apply_noise_gate(&frame, self.cfg.noise_gate_threshold);
        if hit {
            let hits = self.noise_gate_hits.fetch_add(1, Ordering::Relaxed) + 1;
            if matches!(hits, 1 | 100 | 500) {
                info!(channel_id = %self.channel_id, hits, "noise gate silenced a frame");
            }
        }

        let mut state = self.state.lock().await;
        let resampled = state.resampler_to_model.resample(&gated);
        drop(state);

        if resampled.is_empty() {
            return;
        }
        let audio_b64 = BASE64.encode(&resampled);
        if let Err(e) = client.send_json(json!({"type": "input_audio_buffer.append", "audio": audio_b64})) {
            warn!(error = %e, "failed to forward audio to realtime model");
        }
    }

    async fn detect_sample_rate(&self, frame: &[u8], sink: &crate::telephony::bridge::TelephonyConnection) {
        self.detected_sample_rate.store(true, Ordering::Release);
        if frame.len() % BYTES_PER_SAMPLE != 0 {
            return;
        }
        let samples = frame.len() / BYTES_PER_SAMPLE;
        let detected = (samples as u64 * 1000 / self.chunk_ms) as u32;
        if ![8000, 16000, 24000].contains(&detected) {
            return;
        }

        let mut state = self.state.lock().await;
        if detected != state.asterisk_sample_rate {
            warn!(detected, configured = state.asterisk_sample_rate, "overriding configured telephony sample rate");
            *state = SessionState::new(detected, self.chunk_ms);
            sink.set_chunk_bytes(state.chunk_bytes);
        } else {
            debug!(detected, "confirmed configured telephony sample rate");
        }
    }

    async fn handle_event(&self, event: InboundEvent, client: &RealtimeModelClient) {
        match event {
            InboundEvent::SessionCreated { .. } => info!(channel_id = %self.channel_id, "realtime session created"),

            InboundEvent::ResponseAudioDelta { delta } => {
                self.ai_speaking.store(true, Ordering::Release);
                *self.last_ai_audio_at.lock().await = Instant::now();
                match BASE64.decode(delta) {
                    Ok(pcm24) => self.send_audio_to_telephony(&pcm24).await,
                    Err(e) => warn!(error = %e, "undecodable audio delta from realtime model"),
                }
            }

            InboundEvent::ResponseAudioDone {} | InboundEvent::ResponseDone {} => {
                self.ai_speaking.store(false, Ordering::Release);
            }

            InboundEvent::SpeechStarted {} => self.handle_speech_started().await,

            InboundEvent::AudioTranscriptDone { transcript } => {
                info!(channel_id = %self.channel_id, %transcript, "ai said");
                self.ai_speaking.store(false, Ordering::Release);
            }

            InboundEvent::InputTranscriptionCompleted { transcript } => {
                info!(channel_id = %self.channel_id, %transcript, "visitor said");
            }

            InboundEvent::FunctionCallArgumentsDone { call_id, name, arguments } => {
                self.handle_function_call(&call_id, &name, &arguments, client).await;
            }

            InboundEvent::Error { error } => error!(channel_id = %self.channel_id, %error, "realtime model error"),

            InboundEvent::Other => {}
        }
    }

    /// Barge-in policy (spec §4.1 "Turn-taking / barge-in"): only clear the
    /// output queue when the playout loop is genuinely idle and the model
    /// hasn't spoken recently — otherwise the model's own echoed audio is
    /// triggering its own VAD.
    async fn handle_speech_started(&self) {
        if self.playout_queue.is_active_or_buffered() {
            debug!("ignoring barge-in while playout is active");
            return;
        }
        let since_last_audio = self.last_ai_audio_at.lock().await.elapsed();
        if self.ai_speaking.load(Ordering::Acquire) || since_last_audio < self.cfg.barge_in_grace {
            debug!("ignoring barge-in shortly after model audio");
            return;
        }
        let dropped = self.playout_queue.clear();
        if dropped > 0 {
            debug!(dropped, "barge-in cleared playout queue");
        }
        self.ai_speaking.store(false, Ordering::Release);
    }

    async fn send_audio_to_telephony(&self, pcm24: &[u8]) {
        let mut state = self.state.lock().await;
        let pcm_telephony = state.resampler_to_telephony.resample(pcm24);
        let chunk_bytes = state.chunk_bytes;
        drop(state);

        for chunk in pcm_telephony.chunks(chunk_bytes) {
            let frame = if chunk.len() < chunk_bytes {
                let mut padded = chunk.to_vec();
                padded.resize(chunk_bytes, 0);
                padded
            } else {
                chunk.to_vec()
            };
            if self.playout_queue.enqueue(frame) {
                warn!(channel_id = %self.channel_id, "playout queue full, dropped a frame");
            }
        }
    }

    async fn handle_function_call(&self, call_id: &str, name: &str, arguments: &str, client: &RealtimeModelClient) {
        info!(channel_id = %self.channel_id, tool = name, "executing tool call");
        let ctx = ToolContext { tenant: self.tenant, channel_id: &self.channel_id.to_string(), guard_extension: &self.guard_extension };
        let result = self.tools.execute(name, arguments, &ctx).await;

        let output_event = json!({
            "type": "conversation.item.create",
            "item": {
                "type": "function_call_output",
                "call_id": call_id,
                "output": result.to_string(),
            }
        });
        if let Err(e) = client.send_json(output_event) {
            error!(error = %e, "failed to send tool result to realtime model");
            return;
        }
        if let Err(e) = client.send_json(json!({"type": "response.create"})) {
            error!(error = %e, "failed to trigger response generation");
        }
    }
}
