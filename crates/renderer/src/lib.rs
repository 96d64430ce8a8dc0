// Audio output: renderer abstraction, mixing and the shared output sink

mod ctrl;
mod mixer;
mod null;
mod sink;

#[cfg(feature = "desktop")]
mod cpal_renderer;

pub use ctrl::{Ctrl, CtrlHandle, Notify};
pub use mixer::Mixer;
pub use null::{NullRenderer, NullRendererFactory};
pub use sink::OutputSink;

#[cfg(feature = "desktop")]
pub use cpal_renderer::{CpalRenderer, CpalRendererFactory};

use busich_core::Result;

/// Audio output device driven by the sink's render thread.
///
/// Renderers are created on the render thread and never leave it, so they
/// need not be `Send`.
pub trait AudioRenderer {
    /// Open the device and begin playback
    fn start(&mut self) -> Result<()>;

    /// Queue interleaved samples, blocking until the device has taken them
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Stop playback and release the device
    fn stop(&mut self) -> Result<()>;

    /// Drop samples queued on the device but not played yet
    fn flush(&mut self) {}

    /// Format the device was opened with
    fn spec(&self) -> AudioSpec;
}

/// Audio format specification for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames mixed per render step
    pub buffer_size: usize,
}

impl AudioSpec {
    /// Interleaved samples per render step
    pub fn buffer_samples(&self) -> usize {
        self.buffer_size * self.channels as usize
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            // 100ms at the default rate
            buffer_size: 4800,
        }
    }
}

/// Audio renderer factory trait
/// Allows swapping the real device for a headless one
pub trait RendererFactory: Send + Sync {
    /// Create a new renderer with the given audio specification
    fn create_renderer(&self, spec: AudioSpec) -> Result<Box<dyn AudioRenderer>>;

    /// Get the preferred audio specification for this platform
    fn get_preferred_spec(&self) -> AudioSpec;
}
