//! The jitter/playout buffer between the model's audio deltas and the
//! telephony socket, structured as an explicit `Idle`/`Playing` state
//! machine with a monotonic schedule (spec §4.1 output path, §9 "Coroutine
//! control flow").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::dsp::apply_fade;
use crate::audio::ring::BoundedRing;

#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Write one fixed-size frame to the telephony socket. Returns `false`
    /// when the underlying session is gone, ending playback.
    async fn send_frame(&self, frame: &[u8]) -> bool;
}

#[derive(Default, Debug, Clone, Copy)]
pub struct PlayoutStats {
    pub chunks_sent: u64,
    pub drift_corrections: u64,
    pub silence_inserted: u64,
}

/// Shared handle: the model-event handler enqueues frames here, the
/// barge-in policy reads `is_active_or_buffered`/`clear` from it.
pub struct PlayoutQueue {
    ring: BoundedRing<Vec<u8>>,
    playing: AtomicBool,
}

impl PlayoutQueue {
    pub fn new(capacity: usize) -> Self {
        Self { ring: BoundedRing::new(capacity), playing: AtomicBool::new(false) }
    }

    /// Enqueue one fixed-size frame. Drops (and reports) the incoming
    /// frame when the queue is full — the output side's overflow policy.
    pub fn enqueue(&self, frame: Vec<u8>) -> bool {
        self.ring.push_drop_newest(frame)
    }

    pub fn qsize(&self) -> usize {
        self.ring.len()
    }

    /// The condition the barge-in policy checks: playing, or frames are
    /// still buffered waiting to play (spec §4.1 "Turn-taking / barge-in").
    pub fn is_active_or_buffered(&self) -> bool {
        self.playing.load(Ordering::Acquire) || !self.ring.is_empty()
    }

    /// Drop all buffered frames; returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.ring.try_pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

pub struct PlayoutLoop {
    pub queue: Arc<PlayoutQueue>,
    pub chunk_bytes: usize,
    pub chunk_ms: u64,
    pub prebuffer_frames: usize,
}

impl PlayoutLoop {
    pub async fn run(&self, sink: &dyn AudioSink, cancel: &CancellationToken) -> PlayoutStats {
        let chunk_duration = Duration::from_millis(self.chunk_ms);
        let max_silence_frames = ((800u64 / self.chunk_ms.max(1)) as usize).max(10);
        let silence_frame = vec![0u8; self.chunk_bytes];

        let mut stats = PlayoutStats::default();
        let mut chunks_sent: u64 = 0;
        let mut session_start = Instant::now();
        let mut consecutive_silence = 0usize;
        let mut last_was_silence = false;
        let mut playing = false;

        'outer: loop {
            if cancel.is_cancelled() {
                break;
            }

            if !playing {
                self.queue.playing.store(false, Ordering::Release);
                let first = tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = tokio::time::timeout(Duration::from_secs(1), self.queue.ring.pop()) => chunk.ok(),
                };
                let Some(first) = first else { continue };

                let mut prebuffer = vec![first];
                let prebuffer_deadline = Instant::now() + Duration::from_millis(300);
                while prebuffer.len() < self.prebuffer_frames && Instant::now() < prebuffer_deadline {
                    match tokio::time::timeout(Duration::from_millis(100), self.queue.ring.pop()).await {
                        Ok(chunk) => prebuffer.push(chunk),
                        Err(_) => break,
                    }
                }

                playing = true;
                self.queue.playing.store(true, Ordering::Release);
                session_start = Instant::now();
                chunks_sent = 0;
                consecutive_silence = 0;
                info!(frames = prebuffer.len(), "starting playback");

                for (i, chunk) in prebuffer.into_iter().enumerate() {
                    let chunk = if i == 0 { apply_fade(&chunk, true, false) } else { chunk };
                    let target = session_start + chunk_duration * chunks_sent as u32;
                    sleep_until(target).await;
                    if !sink.send_frame(&chunk).await {
                        break 'outer;
                    }
                    chunks_sent += 1;
                }
                last_was_silence = false;
                continue;
            }

            // Playing state: send the next chunk, or silence on underrun.
            let chunk = match self.queue.ring.try_pop() {
                Some(c) => {
                    let c = if last_was_silence { apply_fade(&c, true, false) } else { c };
                    last_was_silence = false;
                    consecutive_silence = 0;
                    c
                }
                None => {
                    stats.silence_inserted += 1;
                    consecutive_silence += 1;
                    if consecutive_silence >= max_silence_frames {
                        playing = false;
                        self.queue.playing.store(false, Ordering::Release);
                        debug!(chunks_sent, "playback paused: buffer empty");
                        continue;
                    }
                    last_was_silence = true;
                    silence_frame.clone()
                }
            };

            let now = Instant::now();
            let target = session_start + chunk_duration * chunks_sent as u32;
            if target > now {
                let wait = target - now;
                if wait > Duration::from_millis(1) {
                    tokio::time::sleep(wait).await;
                }
            } else {
                let behind = now - target;
                if behind > Duration::from_millis(100) {
                    session_start = now - chunk_duration * chunks_sent as u32;
                    stats.drift_corrections += 1;
                    warn!(behind_ms = behind.as_millis(), "playout timing reset");
                }
            }

            if !sink.send_frame(&chunk).await {
                break;
            }
            chunks_sent += 1;
            stats.chunks_sent = chunks_sent;
        }

        self.queue.playing.store(false, Ordering::Release);
        stats
    }
}

async fn sleep_until(target: Instant) {
    let now = Instant::now();
    if target > now {
        tokio::time::sleep(target - now).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink {
        frames: StdMutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl AudioSink for RecordingSink {
        async fn send_frame(&self, frame: &[u8]) -> bool {
            self.frames.lock().unwrap().push(frame.to_vec());
            true
        }
    }

    #[tokio::test]
    async fn plays_prebuffered_frames_then_idles() {
        let queue = Arc::new(PlayoutQueue::new(100));
        for i in 0..3u8 {
            queue.enqueue(vec![i; 4]);
        }
        let playout = PlayoutLoop { queue: queue.clone(), chunk_bytes: 4, chunk_ms: 5, prebuffer_frames: 3 };
        let sink = Arc::new(RecordingSink { frames: StdMutex::new(Vec::new()) });
        let cancel = CancellationToken::new();

        let sink2 = sink.clone();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { playout.run(sink2.as_ref(), &cancel2).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let stats = handle.await.unwrap();

        assert!(stats.chunks_sent >= 3);
        assert_eq!(sink.frames.lock().unwrap().len() as u64, stats.chunks_sent);
    }

    #[test]
    fn queue_reports_buffered_before_playing_starts() {
        let queue = PlayoutQueue::new(10);
        assert!(!queue.is_active_or_buffered());
        queue.enqueue(vec![0; 4]);
        assert!(queue.is_active_or_buffered());
        assert_eq!(queue.clear(), 1);
        assert!(!queue.is_active_or_buffered());
    }
}
