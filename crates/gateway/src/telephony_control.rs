//! `TelephonyControl` seam consumed by the voice bridge's tool runtime
//! (spec §4.3 `transfer_to_guard`). Actual SIP/PBX signaling is outside
//! this repo's external interfaces (spec §6 lists only the telephony
//! stream and HTTP surfaces) — this logs the transfer intent for the PBX
//! integration fronting this service to act on.

use async_trait::async_trait;
use tracing::info;

use concierge_voice::TelephonyControl;

pub struct LoggingTelephonyControl;

#[async_trait]
impl TelephonyControl for LoggingTelephonyControl {
    async fn transfer(&self, channel_id: &str, extension: &str) -> bool {
        info!(channel_id, extension, "requesting transfer to guard extension");
        true
    }
}
