//! Realtime-model event vocabulary (spec §4.2). A closed tagged sum, not
//! an open dispatch table — unrecognized events fall into `Other` rather
//! than failing the call.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: Value },

    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },

    #[serde(rename = "response.audio.done")]
    ResponseAudioDone {},

    #[serde(rename = "response.done")]
    ResponseDone {},

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {},

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone { transcript: String },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted { transcript: String },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone { call_id: String, name: String, arguments: String },

    #[serde(rename = "error")]
    Error { error: Value },

    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_audio_delta() {
        let event: InboundEvent = serde_json::from_str(r#"{"type":"response.audio.delta","delta":"abcd"}"#).unwrap();
        match event {
            InboundEvent::ResponseAudioDelta { delta } => assert_eq!(delta, "abcd"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_falls_back_to_other() {
        let event: InboundEvent = serde_json::from_str(r#"{"type":"rate_limits.updated"}"#).unwrap();
        assert!(matches!(event, InboundEvent::Other));
    }
}
