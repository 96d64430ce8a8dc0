// Decode thread feeding a ring buffer that the render step drains

use busich_core::{Result, Streamer};
use busich_decode::TrackProgress;
use busich_renderer::AudioSpec;
use busich_ringbuffer::SharedRingBuffer;
use busich_transport_http::StreamCloser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Output frames produced per decode step
const CHUNK_FRAMES: usize = 1024;

/// Audio the decode thread may hold ahead of the output
const PREFETCH_SECONDS: usize = 1;

/// Longest wait on a full ring before checking for cancellation again
const FULL_RING_POLL: Duration = Duration::from_millis(20);

struct Feed {
    ring: SharedRingBuffer,
    finished: AtomicBool,
    cancelled: AtomicBool,
}

impl Feed {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancels a decode thread from any thread without waiting for it
#[derive(Clone)]
pub(crate) struct PrefetchHandle {
    feed: Arc<Feed>,
}

impl PrefetchHandle {
    /// Stop decoding and drop whatever is buffered. The decode thread exits
    /// after its current read.
    pub fn cancel(&self) {
        self.feed.cancelled.store(true, Ordering::SeqCst);
        self.feed.ring.clear();
    }
}

/// Start decoding `source` on its own thread.
///
/// `source` must already produce the output format of `spec`. The returned
/// stream is what gets attached to the sink: it only drains the ring and
/// moves the position in `progress`, so a render step never waits on the
/// network. `closer` is closed once the decode thread is done with the
/// source.
pub(crate) fn spawn<S: Streamer + 'static>(
    source: S,
    closer: StreamCloser,
    progress: Arc<TrackProgress>,
    source_rate: u32,
    spec: AudioSpec,
) -> Result<(Prefetched, PrefetchHandle)> {
    let channels = spec.channels.max(1) as usize;
    let feed = Arc::new(Feed {
        ring: SharedRingBuffer::new(spec.sample_rate as usize * channels * PREFETCH_SECONDS),
        finished: AtomicBool::new(false),
        cancelled: AtomicBool::new(false),
    });

    let thread_feed = feed.clone();
    thread::Builder::new()
        .name("busich-decode".to_string())
        .spawn(move || decode_loop(source, closer, thread_feed, CHUNK_FRAMES * channels))?;

    let stream = Prefetched {
        feed: feed.clone(),
        progress,
        channels,
        source_rate: source_rate.max(1) as u64,
        output_rate: spec.sample_rate.max(1) as u64,
        played: 0,
        starved: false,
    };
    Ok((stream, PrefetchHandle { feed }))
}

/// Marks the feed finished however the decode thread ends
struct FinishOnExit(Arc<Feed>);

impl Drop for FinishOnExit {
    fn drop(&mut self) {
        self.0.finished.store(true, Ordering::SeqCst);
    }
}

fn decode_loop<S: Streamer>(
    mut source: S,
    closer: StreamCloser,
    feed: Arc<Feed>,
    chunk_len: usize,
) {
    let _finish = FinishOnExit(feed.clone());
    let mut chunk = vec![0.0f32; chunk_len];

    while !feed.is_cancelled() {
        let n = source.stream(&mut chunk);

        let mut written = 0;
        while written < n && !feed.is_cancelled() {
            written += feed.ring.write_all(&chunk[written..n], FULL_RING_POLL);
        }

        if n < chunk.len() {
            log::debug!("[prefetch] source drained");
            break;
        }
    }

    if feed.is_cancelled() {
        log::debug!("[prefetch] decoding cancelled");
    }
    closer.close();
}

/// Render side of a prefetched pipeline.
///
/// Pads with silence while the decode thread lags behind, and reports
/// itself drained only once the decode thread finished and every buffered
/// frame was handed out.
pub(crate) struct Prefetched {
    feed: Arc<Feed>,
    progress: Arc<TrackProgress>,
    channels: usize,
    source_rate: u64,
    output_rate: u64,
    /// Output frames handed to the sink
    played: u64,
    starved: bool,
}

impl Prefetched {
    fn played_source_frames(&self) -> u64 {
        self.played * self.source_rate / self.output_rate
    }
}

impl Streamer for Prefetched {
    fn stream(&mut self, buf: &mut [f32]) -> usize {
        // Read before draining: a finished feed cannot gain samples afterwards
        let finished = self.feed.finished.load(Ordering::SeqCst);

        let ready = self.feed.ring.available_read();
        let whole = (buf.len() - buf.len() % self.channels).min(ready - ready % self.channels);
        let n = self.feed.ring.read(&mut buf[..whole]);
        self.played += (n / self.channels) as u64;

        if n == buf.len() {
            self.starved = false;
            self.progress.set_position(self.played_source_frames());
            return n;
        }

        if finished {
            // Everything decoded has been played
            self.progress.set_position(self.progress.decoded_frames());
            return n;
        }

        if !self.starved {
            log::debug!("[prefetch] decoder behind the output, padding with silence");
            self.starved = true;
        }
        self.progress.set_position(self.played_source_frames());
        buf[n..].fill(0.0);
        buf.len()
    }
}
