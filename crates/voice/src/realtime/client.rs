//! Thin WebSocket framing layer over the realtime model connection (spec
//! §4.2). A single dial, a single writer task to guarantee ordering, and
//! a reader task that decodes events onto a channel. No reconnect policy:
//! failure is surfaced to the `CallSession` by the channel closing.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

use crate::config::VoiceConfig;
use crate::realtime::events::InboundEvent;

pub struct RealtimeModelClient {
    writer: mpsc::UnboundedSender<Message>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

impl RealtimeModelClient {
    pub async fn connect(cfg: &VoiceConfig) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<InboundEvent>)> {
        let url = format!("{}?model={}", cfg.realtime_url, cfg.realtime_model);
        let mut request = url.into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", HeaderValue::from_str(&format!("Bearer {}", cfg.realtime_api_key))?);
        request.headers_mut().insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let msg = match frame {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "realtime socket read error");
                        break;
                    }
                };
                let Message::Text(text) = msg else { continue };
                match serde_json::from_str::<InboundEvent>(&text) {
                    Ok(event) => {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "unparseable realtime event"),
                }
            }
        });

        Ok((Self { writer: writer_tx, writer_task, reader_task }, events_rx))
    }

    /// Queue a JSON event for the writer task. Ordering across calls from
    /// the same session is preserved by the single-writer channel.
    pub fn send_json(&self, value: serde_json::Value) -> anyhow::Result<()> {
        self.writer
            .send(Message::Text(value.to_string().into()))
            .map_err(|_| anyhow::anyhow!("realtime socket writer task has exited"))
    }

    pub async fn close(self) {
        drop(self.writer);
        self.writer_task.abort();
        self.reader_task.abort();
    }
}
