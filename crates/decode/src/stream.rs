// Decoded PCM stream over a demuxer/decoder pair

use crate::decoder::AudioDecoder;
use crate::demux::Demuxer;
use crate::progress::TrackProgress;
use busich_core::{Result, Streamer};
use std::sync::Arc;
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

/// Interleaved f32 frames decoded on demand from a media source.
///
/// Every delivered frame is counted as decoded in the shared
/// [`TrackProgress`]; moving the playback position is left to whoever
/// hands the frames to the output.
pub struct DecodedStream {
    demuxer: Demuxer,
    decoder: AudioDecoder,
    pending: Vec<f32>,
    pending_pos: usize,
    channels: usize,
    sample_rate: u32,
    progress: Arc<TrackProgress>,
    finished: bool,
}

impl DecodedStream {
    /// Probe the container and prepare the decoder. Nothing is decoded yet.
    pub fn open(source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let demuxer = Demuxer::from_media_source(source, hint)?;
        let track_info = demuxer.get_track_info()?;
        let decoder = AudioDecoder::from_demuxer(&demuxer)?;

        log::info!(
            "[decode] track sample_rate={} channels={} frames={:?}",
            track_info.sample_rate,
            track_info.channels,
            track_info.n_frames
        );

        Ok(Self {
            demuxer,
            decoder,
            pending: Vec::new(),
            pending_pos: 0,
            channels: track_info.channels.max(1) as usize,
            sample_rate: track_info.sample_rate,
            progress: Arc::new(TrackProgress::new(track_info.n_frames)),
            finished: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    /// Frames in the track; zero until known
    pub fn length_frames(&self) -> u64 {
        self.progress.length_frames()
    }

    /// Shared handle on position, length and mid-stream failure
    pub fn progress(&self) -> Arc<TrackProgress> {
        self.progress.clone()
    }

    /// Decode the next packet into `pending`. False once the stream ended.
    fn refill(&mut self) -> bool {
        while !self.finished {
            let packet = match self.demuxer.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    log::debug!("[decode] end of stream");
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    log::error!("[decode] reading packet failed: {}", e);
                    self.progress.fail(e);
                    self.finished = true;
                    break;
                }
            };

            match self.decoder.decode(&packet) {
                Ok(Some(samples)) if !samples.is_empty() => {
                    self.pending = samples;
                    self.pending_pos = 0;
                    return true;
                }
                Ok(_) => continue,
                Err(e) => {
                    log::error!("[decode] decoding packet failed: {}", e);
                    self.progress.fail(e);
                    self.finished = true;
                }
            }
        }
        false
    }
}

impl Streamer for DecodedStream {
    /// Fills whole frames only; a buffer that is not a multiple of the
    /// channel count gets its tail left untouched.
    fn stream(&mut self, buf: &mut [f32]) -> usize {
        let wanted = buf.len() - buf.len() % self.channels;
        let mut written = 0;

        while written < wanted {
            if self.pending_pos >= self.pending.len() && !self.refill() {
                break;
            }

            let available = self.pending.len() - self.pending_pos;
            let n = available.min(wanted - written);
            buf[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            written += n;
        }

        self.progress.advance_decoded((written / self.channels) as u64);
        if written < wanted {
            self.progress.finish();
        }
        written
    }
}
