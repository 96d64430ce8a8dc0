// Demuxing audio containers using Symphonia

use busich_core::{AudioError, Result};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Extension assumed when the URL does not carry one
const DEFAULT_EXTENSION: &str = "mp3";

/// Lowercased extension of a URL path, ignoring query string and fragment.
///
/// Streaming URLs without an extension are assumed to serve MP3.
pub fn url_extension(url: &str) -> String {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION)
        .to_ascii_lowercase()
}

/// Build a probe hint from the extension of a URL path
pub fn hint_from_url(url: &str) -> Hint {
    let mut hint = Hint::new();
    hint.with_extension(&url_extension(url));
    hint
}

/// Audio demuxer wrapper
pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
}

impl Demuxer {
    /// Probe `media_source` and select its default track
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(probe_error)?;

        let format_reader = probe_result.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| AudioError::DecodeFailure("No default track found".to_string()))?;
        let track_id = track.id;

        Ok(Self {
            format_reader,
            track_id,
        })
    }

    /// Next packet of the selected track, `None` at end of stream
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("Stream requires a decoder reset, treating it as the end");
                    return Ok(None);
                }
                Err(SymphoniaError::IoError(e)) => return Err(AudioError::from(e)),
                Err(e) => {
                    return Err(AudioError::DecodeFailure(format!(
                        "Failed to read packet: {}",
                        e
                    )))
                }
            };

            // Only return packets for our track
            if packet.track_id() == self.track_id {
                return Ok(Some(packet));
            }
        }
    }

    /// Get track information
    pub fn get_track_info(&self) -> Result<TrackInfo> {
        let track = self
            .format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .ok_or_else(|| AudioError::DecodeFailure("Track not found".to_string()))?;

        let codec_params = &track.codec_params;

        Ok(TrackInfo {
            sample_rate: codec_params.sample_rate.ok_or_else(|| {
                AudioError::DecodeFailure("Sample rate not specified".to_string())
            })?,
            channels: codec_params
                .channels
                .map(|c| c.count() as u16)
                .unwrap_or(2),
            n_frames: codec_params.n_frames,
        })
    }

    /// Get reference to format reader
    pub fn format_reader(&self) -> &dyn FormatReader {
        &*self.format_reader
    }

    /// Get track ID
    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}

fn probe_error(e: SymphoniaError) -> AudioError {
    match e {
        // Transport failures keep their own class
        SymphoniaError::IoError(io) if io.kind() != std::io::ErrorKind::UnexpectedEof => {
            AudioError::from(io).with_context("probing media")
        }
        other => AudioError::DecodeFailure(format!("Failed to probe media: {}", other)),
    }
}

/// Track information
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame count declared by the container, if any
    pub n_frames: Option<u64>,
}
