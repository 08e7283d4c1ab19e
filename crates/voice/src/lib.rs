//! Real-time voice bridge between the telephony stream and the realtime
//! speech model (spec §4.1–§4.3): audio resampling and jitter buffering,
//! a thin realtime-model WebSocket client, and the fixed tool catalog the
//! model can call mid-conversation.

pub mod audio;
pub mod config;
pub mod realtime;
pub mod session;
pub mod telephony;
pub mod tools;

pub use config::VoiceConfig;
pub use session::CallSession;
pub use telephony::bridge::{serve, TelephonyChannel, TelephonyConnection};
pub use tools::{DemoDirectory, ResidentDirectory, TelephonyControl, ToolContext, ToolRuntime};
