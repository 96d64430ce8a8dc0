// Demuxing and decoding of compressed audio into PCM streams

pub mod decoder;
pub mod demux;
pub mod progress;
pub mod stream;

pub use decoder::AudioDecoder;
pub use demux::{hint_from_url, url_extension, Demuxer, TrackInfo};
pub use progress::{duration_to_frames, frames_to_duration, TrackProgress};
pub use stream::DecodedStream;
