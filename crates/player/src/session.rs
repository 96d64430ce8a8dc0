// One song's playback: state machine, pipeline setup and status reports

use crate::prefetch::{self, PrefetchHandle};
use busich_core::{
    AudioError, Completion, Player, PlayerState, PlayerStateContainer, PlayerStatus, Result,
    StreamableSong,
};
use busich_decode::{duration_to_frames, hint_from_url, DecodedStream, TrackProgress};
use busich_renderer::{Ctrl, CtrlHandle, Notify, OutputSink};
use busich_resampler::Resample;
use busich_transport_http::{HttpClient, RemoteStream};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handles on a pipeline attached to the sink
struct Pipeline {
    ctrl: CtrlHandle,
    prefetch: PrefetchHandle,
    progress: Arc<TrackProgress>,
    sample_rate: u32,
}

impl Pipeline {
    /// Stop rendering and decoding; neither waits on the other thread
    fn detach(&self) {
        self.ctrl.detach();
        self.prefetch.cancel();
    }
}

/// Playback of a single song through a shared [`OutputSink`].
///
/// [`start`](Player::start) blocks for the whole playback; the other
/// operations are meant to be called from other threads meanwhile. A
/// session plays at most once.
pub struct PlaybackSession {
    song: StreamableSong,
    sink: OutputSink,
    http: Arc<dyn HttpClient>,
    state: PlayerStateContainer,
    done: Arc<Completion>,
    started: AtomicBool,
    /// Set once the pipeline is attached. Also serializes pause toggles
    /// against stop.
    pipeline: Mutex<Option<Pipeline>>,
}

impl PlaybackSession {
    pub fn new(song: StreamableSong, sink: OutputSink, http: Arc<dyn HttpClient>) -> Self {
        Self {
            song,
            sink,
            http,
            state: PlayerStateContainer::new(),
            done: Arc::new(Completion::new()),
            started: AtomicBool::new(false),
            pipeline: Mutex::new(None),
        }
    }

    pub fn song(&self) -> &StreamableSong {
        &self.song
    }

    pub fn state(&self) -> PlayerState {
        self.state.get_state()
    }

    /// Wait up to `timeout` for playback to end. Returns whether it did.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.done.wait_timeout(timeout)
    }

    /// Stop requested while setting up
    fn cancelled(&self) -> bool {
        self.state.get_state() != PlayerState::Loading
    }

    /// Record a setup failure. A session stopped meanwhile swallows it.
    fn fail_setup(&self, error: AudioError) -> Result<()> {
        let error = error.with_context(format!("playing {}", self.song.streaming_url));
        log::error!("[session] {}", error);

        let recorded = self.state.fail(error.clone());
        self.done.fire();
        if recorded {
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Open, decode and attach. `Ok(false)` when stopped before attaching.
    fn attach(&self) -> Result<bool> {
        let url = &self.song.streaming_url;

        let stream = RemoteStream::open(url.as_str(), self.http.clone())?;
        let closer = stream.closer();
        if self.cancelled() {
            return Ok(false);
        }

        let decoded = DecodedStream::open(Box::new(stream), hint_from_url(url))?;
        let sample_rate = decoded.sample_rate();
        let channels = decoded.channels();
        let progress = decoded.progress();
        if !self.song.duration.is_zero() {
            progress.set_length_if_unknown(duration_to_frames(self.song.duration, sample_rate));
        }
        if self.cancelled() {
            return Ok(false);
        }

        self.sink.ensure_started()?;
        let spec = self.sink.spec();

        let resampled = Resample::new(
            decoded,
            sample_rate,
            spec.sample_rate,
            channels,
            spec.channels,
        );
        // Network reads and decoding stay off the render thread
        let (prefetched, decoding) =
            prefetch::spawn(resampled, closer, progress.clone(), sample_rate, spec)?;

        let state = self.state.clone();
        let done = self.done.clone();
        let track = progress.clone();
        let song_url = url.clone();
        let notified = Notify::new(prefetched, move || {
            match track.failure() {
                Some(error) => {
                    let error = error.with_context(format!("playing {}", song_url));
                    log::error!("[session] playback failed: {}", error);
                    state.fail(error);
                }
                None => {
                    log::info!("[session] reached end of stream");
                    state.transition_with(|s| s.is_attached().then_some(PlayerState::Stopped));
                }
            }
            done.fire();
        });
        let ctrl = Ctrl::new(notified);

        {
            let mut pipeline = self.pipeline.lock();
            if self.state.transition(PlayerState::Playing).is_err() {
                decoding.cancel();
                return Ok(false);
            }
            *pipeline = Some(Pipeline {
                ctrl: ctrl.handle(),
                prefetch: decoding,
                progress,
                sample_rate,
            });
        }
        // A stop landing here has already detached `ctrl`; the sink drops it
        // on its first pull
        self.sink.play(Box::new(ctrl));

        Ok(true)
    }
}

impl Player for PlaybackSession {
    fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AudioError::InvalidState(
                "Session has already been started".to_string(),
            ));
        }

        if let Err(e) = self.state.transition(PlayerState::Loading) {
            // Stopped before start
            if self.state.get_state() == PlayerState::Stopped {
                return Ok(());
            }
            return Err(e);
        }
        log::info!("[session] loading {}", self.song.streaming_url);

        match self.attach() {
            Ok(true) => {}
            Ok(false) => {
                log::info!("[session] stopped while loading");
                self.done.fire();
                return Ok(());
            }
            Err(e) => return self.fail_setup(e),
        }

        log::info!("[session] playing {}", self.song.name);
        self.done.wait();

        match self.state.snapshot() {
            (PlayerState::Error, Some(error)) => Err(error),
            _ => Ok(()),
        }
    }

    fn pause_or_resume(&self) {
        let pipeline = self.pipeline.lock();
        let Some(pipeline) = pipeline.as_ref() else {
            return;
        };

        let toggled = self.state.transition_with(|s| match s {
            PlayerState::Playing => Some(PlayerState::Paused),
            PlayerState::Paused => Some(PlayerState::Playing),
            _ => None,
        });
        if let Some((_, to)) = toggled {
            pipeline.ctrl.set_paused(to == PlayerState::Paused);
            log::info!("[session] {}", to);
        }
    }

    fn stop(&self) {
        {
            let pipeline = self.pipeline.lock();
            let stopped = self
                .state
                .transition_with(|s| (!s.is_terminal()).then_some(PlayerState::Stopped));
            if let Some((from, _)) = stopped {
                log::info!("[session] stopped from {}", from);
            }
            if let Some(pipeline) = pipeline.as_ref() {
                pipeline.detach();
                if stopped.is_some() {
                    self.sink.flush();
                }
            }
        }
        self.done.fire();
    }

    fn report(&self) -> PlayerStatus {
        let track = self
            .pipeline
            .lock()
            .as_ref()
            .map(|p| (p.progress.clone(), p.sample_rate));

        let (position, length) = match track {
            Some((progress, sample_rate)) => {
                // Hold the render lock so position and length come from the same step
                let _render = self.sink.lock();
                (progress.position(sample_rate), progress.length(sample_rate))
            }
            None => (Duration::ZERO, Duration::ZERO),
        };

        let (state, error) = self.state.snapshot();
        PlayerStatus {
            song: self.song.clone(),
            state,
            error,
            position,
            length,
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.get_mut().as_ref() {
            pipeline.detach();
        }
    }
}
