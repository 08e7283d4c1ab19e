//! Telephony stream server: accepts connections, extracts the call id,
//! and hands each connection off to a session handler as a duplex
//! `TelephonyChannel` (spec §4.1 "Telephony stream transport").

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::playout::AudioSink;
use crate::audio::ring::BoundedRing;
use crate::telephony::framing::{parse_call_id, read_frame, write_frame, MSG_AUDIO, MSG_ERROR, MSG_HANGUP, MSG_UUID};

const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);
const DEFAULT_CHUNK_BYTES: usize = 320; // 8kHz, 20ms, 16-bit mono

/// ~500ms at 8kHz/20ms frames (spec §4.1 input-path step 3); overflow
/// drops the oldest buffered frame, matching `call_session.py`'s
/// `asyncio.Queue(maxsize=25)` drop-oldest behavior.
const INPUT_RING_CAPACITY: usize = 25;

/// Write half of a telephony connection, shared between the playout loop
/// and the keepalive timer.
#[derive(Clone)]
pub struct TelephonyConnection {
    write_half: Arc<Mutex<OwnedWriteHalf>>,
    chunk_bytes: Arc<AtomicUsize>,
}

impl TelephonyConnection {
    /// Called once the bridge's session handler auto-detects the real
    /// sample rate (spec §4.1 "Sample-rate policy"), so silence keepalives
    /// match the negotiated frame size.
    pub fn set_chunk_bytes(&self, chunk_bytes: usize) {
        self.chunk_bytes.store(chunk_bytes, Ordering::Relaxed);
    }
}

#[async_trait]
impl AudioSink for TelephonyConnection {
    async fn send_frame(&self, frame: &[u8]) -> bool {
        let mut w = self.write_half.lock().await;
        write_frame(&mut *w, MSG_AUDIO, frame).await.is_ok()
    }
}

pub struct TelephonyChannel {
    pub call_id: Uuid,
    pub peer_addr: SocketAddr,
    pub sink: TelephonyConnection,
    pub audio_in: Arc<BoundedRing<Vec<u8>>>,
    pub cancel: CancellationToken,
}

pub async fn serve<F, Fut>(listener: TcpListener, handler: F) -> std::io::Result<()>
where
    F: Fn(TelephonyChannel) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        stream.set_nodelay(true)?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                warn!(%peer_addr, error = %e, "telephony connection ended with error");
            }
        });
    }
}

async fn handle_connection<F, Fut>(stream: TcpStream, peer_addr: SocketAddr, handler: F) -> std::io::Result<()>
where
    F: Fn(TelephonyChannel) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (mut read_half, write_half) = stream.into_split();

    let (msg_type, payload) = read_frame(&mut read_half).await?;
    if msg_type != MSG_UUID {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "first frame must carry a call id"));
    }
    let call_id = parse_call_id(&payload)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "unparseable call id"))?;
    info!(%call_id, %peer_addr, "telephony connection accepted");

    let sink = TelephonyConnection {
        write_half: Arc::new(Mutex::new(write_half)),
        chunk_bytes: Arc::new(AtomicUsize::new(DEFAULT_CHUNK_BYTES)),
    };
    let audio_in = Arc::new(BoundedRing::new(INPUT_RING_CAPACITY));
    let cancel = CancellationToken::new();

    let channel = TelephonyChannel { call_id, peer_addr, sink: sink.clone(), audio_in: audio_in.clone(), cancel: cancel.clone() };
    let session_task = tokio::spawn(handler(channel));

    let read_result = read_loop(read_half, audio_in, sink, cancel.clone()).await;
    cancel.cancel();
    let _ = session_task.await;
    read_result
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    audio_in: Arc<BoundedRing<Vec<u8>>>,
    sink: TelephonyConnection,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        match tokio::time::timeout(KEEPALIVE_IDLE, read_frame(&mut read_half)).await {
            Ok(Ok((MSG_AUDIO, payload))) => {
                if audio_in.push_drop_oldest(payload) {
                    debug!("input ring full, dropped oldest telephony frame");
                }
            }
            Ok(Ok((MSG_HANGUP, _))) => {
                info!("telephony hangup frame received");
                return Ok(());
            }
            Ok(Ok((MSG_ERROR, payload))) => {
                let code = payload.first().copied().unwrap_or(0);
                warn!(code, "telephony error frame received");
                return Ok(());
            }
            Ok(Ok((other, _))) => {
                warn!(msg_type = other, "ignoring unexpected telephony frame type");
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                // No frame for 30s: keep the connection open with silence.
                let silence = vec![0u8; sink.chunk_bytes.load(Ordering::Relaxed)];
                let mut w = sink.write_half.lock().await;
                if write_frame(&mut *w, MSG_AUDIO, &silence).await.is_err() || w.flush().await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
