// Shared fixtures for playback tests

#![allow(dead_code)]

use busich_player::{AudioSpec, NullRendererFactory, OutputSink, PlaybackSession, StreamableSong};
use busich_player::{HttpClient, Player, PlayerState};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const SAMPLE_RATE: u32 = 8000;

/// 16-bit mono WAV holding a sawtooth of `seconds` length
pub fn wav_bytes(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (seconds * SAMPLE_RATE as f32) as u32;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 80) as i16 - 40) * 200).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Headless sink with 50ms render steps
pub fn null_sink() -> OutputSink {
    let spec = AudioSpec {
        sample_rate: SAMPLE_RATE,
        channels: 2,
        buffer_size: 400,
    };
    OutputSink::new(Arc::new(NullRendererFactory::new(spec)), spec)
}

pub fn session(url: &str, sink: OutputSink, http: Arc<dyn HttpClient>) -> Arc<PlaybackSession> {
    Arc::new(PlaybackSession::new(StreamableSong::from_url(url), sink, http))
}

/// Run `start` on its own thread
pub fn spawn_start(
    session: &Arc<PlaybackSession>,
) -> thread::JoinHandle<busich_player::Result<()>> {
    let session = session.clone();
    thread::spawn(move || session.start())
}

/// Poll until the session reaches `state`
pub fn wait_for_state(session: &PlaybackSession, state: PlayerState, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if session.report().state == state {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
