// Headless renderer paced by the wall clock

use crate::{AudioRenderer, AudioSpec, RendererFactory};
use busich_core::{AudioError, Result};
use std::thread;
use std::time::{Duration, Instant};

/// Renderer without a device.
///
/// Samples are discarded, but `write` sleeps so that samples leave at the
/// rate a real device would consume them. Playback time therefore matches
/// real time, which keeps position reporting meaningful in tests and on
/// machines without audio hardware.
pub struct NullRenderer {
    spec: AudioSpec,
    started_at: Option<Instant>,
    frames_written: u64,
}

impl NullRenderer {
    pub fn new(spec: AudioSpec) -> Self {
        Self {
            spec,
            started_at: None,
            frames_written: 0,
        }
    }

    /// Total frames consumed since start
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioRenderer for NullRenderer {
    fn start(&mut self) -> Result<()> {
        log::info!(
            "[null] rendering {} Hz x{} without a device",
            self.spec.sample_rate,
            self.spec.channels
        );
        self.started_at = Some(Instant::now());
        self.frames_written = 0;
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        self.frames_written += (samples.len() / self.spec.channels.max(1) as usize) as u64;

        let due = started_at
            + Duration::from_secs_f64(self.frames_written as f64 / self.spec.sample_rate.max(1) as f64);
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started_at = None;
        Ok(())
    }

    fn spec(&self) -> AudioSpec {
        self.spec
    }
}

/// Factory for [`NullRenderer`]
#[derive(Debug, Clone, Default)]
pub struct NullRendererFactory {
    spec: AudioSpec,
    unavailable: bool,
}

impl NullRendererFactory {
    pub fn new(spec: AudioSpec) -> Self {
        Self {
            spec,
            unavailable: false,
        }
    }

    /// Factory whose device can never be opened
    pub fn unavailable() -> Self {
        Self {
            spec: AudioSpec::default(),
            unavailable: true,
        }
    }
}

impl RendererFactory for NullRendererFactory {
    fn create_renderer(&self, spec: AudioSpec) -> Result<Box<dyn AudioRenderer>> {
        if self.unavailable {
            return Err(AudioError::OutputInitFailure(
                "No output device available".to_string(),
            ));
        }
        Ok(Box::new(NullRenderer::new(spec)))
    }

    fn get_preferred_spec(&self) -> AudioSpec {
        self.spec
    }
}
