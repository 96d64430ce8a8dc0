// Audio decoding using Symphonia

use crate::demux::Demuxer;
use busich_core::{AudioError, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

/// Audio decoder
pub struct AudioDecoder {
    decoder: Box<dyn Decoder>,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    /// Create decoder for the demuxer's selected track
    pub fn from_demuxer(demuxer: &Demuxer) -> Result<Self> {
        let track = demuxer
            .format_reader()
            .tracks()
            .iter()
            .find(|t| t.id == demuxer.track_id())
            .ok_or_else(|| AudioError::DecodeFailure("Track not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::DecodeFailure(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            decoder,
            sample_buf: None,
        })
    }

    /// Decode a packet into interleaved f32 samples.
    ///
    /// Returns `Ok(None)` for a corrupt packet that should be skipped.
    pub fn decode(&mut self, packet: &Packet) -> Result<Option<Vec<f32>>> {
        let audio_buf = match self.decoder.decode(packet) {
            Ok(audio_buf) => audio_buf,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet: {}", msg);
                return Ok(None);
            }
            Err(SymphoniaError::IoError(e)) => return Err(AudioError::from(e)),
            Err(e) => return Err(AudioError::DecodeFailure(format!("Decoding failed: {}", e))),
        };

        let spec = *audio_buf.spec();
        let capacity = audio_buf.capacity() as u64;
        let needed = capacity as usize * spec.channels.count();

        // Reuse the conversion buffer unless a packet outgrows it
        let sample_buf = match &mut self.sample_buf {
            Some(buf) if buf.capacity() >= needed => buf,
            slot => slot.insert(SampleBuffer::new(capacity, spec)),
        };
        sample_buf.copy_interleaved_ref(audio_buf);

        Ok(Some(sample_buf.samples().to_vec()))
    }
}
