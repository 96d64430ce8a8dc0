// End-to-end playback over an in-memory origin and a headless sink

mod common;

use busich_player::{
    AudioError, HttpClient, MemoryOrigin, NullRendererFactory, OutputSink, Player, PlayerState,
    Result,
};
use busich_transport_http::HttpResponse;
use common::{null_sink, session, spawn_start, wait_for_state, wav_bytes};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const URL: &str = "https://cdn.test/music/tone.wav";

#[test]
fn ten_second_song_plays_pauses_and_stops() {
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(10.0)));
    let session = session(URL, null_sink(), origin.clone());
    let handle = spawn_start(&session);

    assert!(wait_for_state(&session, PlayerState::Playing, Duration::from_secs(5)));
    let status = session.report();
    assert_eq!(status.length, Duration::from_secs(10));
    assert!(status.error.is_none());

    thread::sleep(Duration::from_millis(300));
    let playing_at = session.report().position;
    assert!(playing_at > Duration::ZERO);

    session.pause_or_resume();
    assert_eq!(session.report().state, PlayerState::Paused);
    thread::sleep(Duration::from_millis(100));
    let paused_at = session.report().position;
    thread::sleep(Duration::from_millis(400));
    assert_eq!(session.report().position, paused_at);

    session.pause_or_resume();
    assert_eq!(session.report().state, PlayerState::Playing);
    thread::sleep(Duration::from_millis(400));
    assert!(session.report().position > paused_at);

    session.stop();
    assert!(handle.join().unwrap().is_ok());

    let status = session.report();
    assert_eq!(status.state, PlayerState::Stopped);
    assert!(status.error.is_none());
    assert!(status.position < status.length);
}

#[test]
fn short_song_ends_on_its_own() {
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(0.3)).with_max_chunk(1500));
    let session = session(URL, null_sink(), origin);

    session.start().unwrap();

    let status = session.report();
    assert_eq!(status.state, PlayerState::Stopped);
    assert_eq!(status.position, Duration::from_millis(300));
    assert_eq!(status.length, Duration::from_millis(300));
}

#[test]
fn sequential_origin_plays_through() {
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(0.2)).without_ranges());
    let session = session(URL, null_sink(), origin);

    session.start().unwrap();
    assert_eq!(session.report().state, PlayerState::Stopped);
}

#[test]
fn head_failure_is_resource_unavailable() {
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(1.0)).with_head_status(500));
    let session = session(URL, null_sink(), origin.clone());

    let err = session.start().unwrap_err();
    assert!(matches!(err.root(), AudioError::ResourceUnavailable(_)), "{:?}", err);
    // No body was ever requested
    assert_eq!(origin.get_count(), 0);

    let status = session.report();
    assert_eq!(status.state, PlayerState::Error);
    assert!(matches!(
        status.error.as_ref().map(AudioError::root),
        Some(AudioError::ResourceUnavailable(_))
    ));
    assert_eq!(status.position, Duration::ZERO);
    assert_eq!(status.length, Duration::ZERO);
}

#[test]
fn garbage_payload_is_decode_failure() {
    let origin = Arc::new(MemoryOrigin::new(vec![0x42u8; 8192]));
    let session = session("https://cdn.test/song.mp3", null_sink(), origin);

    let err = session.start().unwrap_err();
    assert!(matches!(err.root(), AudioError::DecodeFailure(_)), "{:?}", err);
    assert_eq!(session.report().state, PlayerState::Error);
}

#[test]
fn missing_output_device_fails_start() {
    let sink = OutputSink::with_preferred_spec(Arc::new(NullRendererFactory::unavailable()));
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(1.0)));
    let session = session(URL, sink, origin);

    let err = session.start().unwrap_err();
    assert!(matches!(err.root(), AudioError::OutputInitFailure(_)), "{:?}", err);
    assert_eq!(session.report().state, PlayerState::Error);
}

#[test]
fn concurrent_stops_release_start_once() {
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(10.0)));
    let session = session(URL, null_sink(), origin);
    let handle = spawn_start(&session);
    assert!(wait_for_state(&session, PlayerState::Playing, Duration::from_secs(5)));

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let session = session.clone();
            thread::spawn(move || session.stop())
        })
        .collect();
    for stopper in stoppers {
        stopper.join().unwrap();
    }

    assert!(handle.join().unwrap().is_ok());
    assert_eq!(session.report().state, PlayerState::Stopped);

    // Stopping again after the fact is harmless
    session.stop();
    assert_eq!(session.report().state, PlayerState::Stopped);
}

#[test]
fn pause_while_loading_is_ignored() {
    let session = session(URL, null_sink(), Arc::new(MemoryOrigin::new(wav_bytes(1.0))));
    session.pause_or_resume();
    assert_eq!(session.report().state, PlayerState::NotInitialized);

    let handle = spawn_start(&session);
    assert!(wait_for_state(&session, PlayerState::Playing, Duration::from_secs(5)));
    session.stop();
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn sessions_share_one_sink_in_turn() {
    let sink = null_sink();
    let origin = Arc::new(MemoryOrigin::new(wav_bytes(0.2)));

    for _ in 0..2 {
        let session = session(URL, sink.clone(), origin.clone());
        session.start().unwrap();
        assert_eq!(session.report().state, PlayerState::Stopped);
    }
    assert!(sink.is_started());
    assert!(sink.lock().is_empty());
}

/// Origin whose bodies break after a fixed number of bytes
struct BrokenOrigin {
    inner: MemoryOrigin,
    fail_after: u64,
}

struct BrokenBody {
    inner: Box<dyn Read + Send + Sync>,
    remaining: u64,
}

impl Read for BrokenBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        let len = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..len])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl HttpClient for BrokenOrigin {
    fn head(&self, url: &str) -> Result<HttpResponse> {
        self.inner.head(url)
    }

    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        let mut response = self.inner.get_from(url, offset)?;
        let body = std::mem::replace(&mut response.body, Box::new(io::empty()));
        response.body = Box::new(BrokenBody {
            inner: body,
            remaining: self.fail_after.saturating_sub(offset),
        });
        Ok(response)
    }
}

#[test]
fn connection_lost_mid_song_is_an_error() {
    let origin = Arc::new(BrokenOrigin {
        inner: MemoryOrigin::new(wav_bytes(2.0)),
        fail_after: 4000,
    });
    let session = session(URL, null_sink(), origin);

    let err = session.start().unwrap_err();
    assert!(
        matches!(
            err.root(),
            AudioError::Io {
                kind: io::ErrorKind::ConnectionReset,
                ..
            }
        ),
        "{:?}",
        err
    );

    let status = session.report();
    assert_eq!(status.state, PlayerState::Error);
    assert!(status.error.is_some());
    assert!(status.position < Duration::from_secs(2));
}

/// Origin whose bodies hang once, when a read crosses `stall_at`
struct StallingOrigin {
    inner: MemoryOrigin,
    stall_at: u64,
    stall: Duration,
    stalled: Arc<AtomicBool>,
}

struct StallingBody {
    inner: Box<dyn Read + Send + Sync>,
    offset: u64,
    stall_at: u64,
    stall: Duration,
    stalled: Arc<AtomicBool>,
}

impl Read for StallingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let crossing = self.offset + buf.len() as u64 > self.stall_at;
        if crossing && !self.stalled.swap(true, Ordering::SeqCst) {
            thread::sleep(self.stall);
        }
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl HttpClient for StallingOrigin {
    fn head(&self, url: &str) -> Result<HttpResponse> {
        self.inner.head(url)
    }

    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        let mut response = self.inner.get_from(url, offset)?;
        let body = std::mem::replace(&mut response.body, Box::new(io::empty()));
        response.body = Box::new(StallingBody {
            inner: body,
            offset,
            stall_at: self.stall_at,
            stall: self.stall,
            stalled: self.stalled.clone(),
        });
        Ok(response)
    }
}

#[test]
fn report_stays_responsive_while_the_origin_stalls() {
    // About one second into a 16 kB/s stream
    let origin = Arc::new(StallingOrigin {
        inner: MemoryOrigin::new(wav_bytes(10.0)),
        stall_at: 16_000,
        stall: Duration::from_secs(2),
        stalled: Arc::new(AtomicBool::new(false)),
    });
    let session = session(URL, null_sink(), origin.clone());
    let handle = spawn_start(&session);
    assert!(wait_for_state(&session, PlayerState::Playing, Duration::from_secs(5)));

    let mut worst = Duration::ZERO;
    let until = Instant::now() + Duration::from_secs(3);
    while Instant::now() < until {
        let begin = Instant::now();
        let status = session.report();
        worst = worst.max(begin.elapsed());
        assert!(status.error.is_none());
        thread::sleep(Duration::from_millis(20));
    }
    assert!(origin.stalled.load(Ordering::SeqCst));
    assert!(worst < Duration::from_millis(200), "report blocked for {:?}", worst);

    // Neither pause nor stop waits for the stalled read
    let begin = Instant::now();
    session.pause_or_resume();
    session.stop();
    assert!(begin.elapsed() < Duration::from_millis(200));
    assert!(handle.join().unwrap().is_ok());
    assert_eq!(session.report().state, PlayerState::Stopped);
}

/// Origin whose HEAD request waits for the test to let it through
struct GatedHeadOrigin {
    inner: MemoryOrigin,
    in_flight: Barrier,
    release: Barrier,
}

impl HttpClient for GatedHeadOrigin {
    fn head(&self, url: &str) -> Result<HttpResponse> {
        self.in_flight.wait();
        self.release.wait();
        self.inner.head(url)
    }

    fn get_from(&self, url: &str, offset: u64) -> Result<HttpResponse> {
        self.inner.get_from(url, offset)
    }
}

#[test]
fn stop_while_loading_cancels_start() {
    let origin = Arc::new(GatedHeadOrigin {
        inner: MemoryOrigin::new(wav_bytes(1.0)),
        in_flight: Barrier::new(2),
        release: Barrier::new(2),
    });
    let sink = null_sink();
    let session = session(URL, sink.clone(), origin.clone());
    let handle = spawn_start(&session);

    origin.in_flight.wait();
    assert_eq!(session.report().state, PlayerState::Loading);

    session.stop();
    assert_eq!(session.report().state, PlayerState::Stopped);
    origin.release.wait();

    assert!(handle.join().unwrap().is_ok());
    let status = session.report();
    assert_eq!(status.state, PlayerState::Stopped);
    assert!(status.error.is_none());
    assert_eq!(status.position, Duration::ZERO);
    // Nothing ever reached the output
    assert!(!sink.is_started());
    assert!(sink.lock().is_empty());
}
