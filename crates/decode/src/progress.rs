// Shared decode progress of a track

use busich_core::AudioError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Position and length of a track in frames.
///
/// The decoder counts frames it has produced; the render step moves the
/// position as those frames reach the output. Position updates happen
/// inside a render step, so readers that want position and length to be
/// consistent take the output sink's render lock before reading.
#[derive(Debug, Default)]
pub struct TrackProgress {
    position: AtomicU64,
    /// Runs ahead of `position` by whatever is buffered
    decoded: AtomicU64,
    /// Zero while unknown
    length: AtomicU64,
    failure: Mutex<Option<AudioError>>,
}

impl TrackProgress {
    pub fn new(length_frames: Option<u64>) -> Self {
        Self {
            position: AtomicU64::new(0),
            decoded: AtomicU64::new(0),
            length: AtomicU64::new(length_frames.unwrap_or(0)),
            failure: Mutex::new(None),
        }
    }

    pub fn position_frames(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub fn length_frames(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    pub fn decoded_frames(&self) -> u64 {
        self.decoded.load(Ordering::Acquire)
    }

    /// Count frames produced by the decoder
    pub fn advance_decoded(&self, frames: u64) {
        self.decoded.fetch_add(frames, Ordering::AcqRel);
    }

    /// Move the position, never past what was decoded
    pub fn set_position(&self, frames: u64) {
        self.position
            .store(frames.min(self.decoded_frames()), Ordering::Release);
    }

    /// Set the length unless one is already known
    pub fn set_length_if_unknown(&self, frames: u64) {
        let _ = self
            .length
            .compare_exchange(0, frames, Ordering::AcqRel, Ordering::Acquire);
    }

    /// End of stream reached: the length is exactly what was decoded
    pub fn finish(&self) {
        self.length.store(self.decoded_frames(), Ordering::Release);
    }

    /// Record a failure that ended the stream early
    pub fn fail(&self, error: AudioError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    pub fn failure(&self) -> Option<AudioError> {
        self.failure.lock().clone()
    }

    /// Position converted with `sample_rate`
    pub fn position(&self, sample_rate: u32) -> Duration {
        frames_to_duration(self.position_frames(), sample_rate)
    }

    /// Length converted with `sample_rate`
    pub fn length(&self, sample_rate: u32) -> Duration {
        frames_to_duration(self.length_frames(), sample_rate)
    }
}

pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let secs = frames / sample_rate as u64;
    let rem = frames % sample_rate as u64;
    Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / sample_rate as u64)
}

pub fn duration_to_frames(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).round() as u64
}
