// cpal-based renderer for the system's default output device

use crate::{AudioRenderer, AudioSpec, RendererFactory};
use busich_core::{AudioError, Result};
use busich_ringbuffer::SharedRingBuffer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::time::Duration;

/// How long `write` waits for the device to drain before giving up on a buffer
const DEVICE_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// cpal audio renderer
///
/// `write` feeds a ring buffer sized to two render steps; the device
/// callback drains it and pads underruns with silence.
pub struct CpalRenderer {
    stream: Option<Stream>,
    ring_buffer: SharedRingBuffer,
    spec: AudioSpec,
    stalled: bool,
}

impl CpalRenderer {
    pub fn new(spec: AudioSpec) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            AudioError::OutputInitFailure("No output device available".to_string())
        })?;

        if let Ok(name) = device.name() {
            log::info!("[cpal] using output device '{}'", name);
        }

        let config = StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring_buffer = SharedRingBuffer::new(spec.buffer_samples() * 2);
        let ring_buffer_clone = ring_buffer.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let read = ring_buffer_clone.read(data);
                    // Zero-fill any unwritten samples to prevent playing stale data
                    data[read..].fill(0.0);
                },
                |err| {
                    log::error!("[cpal] stream error: {}", err);
                },
                None,
            )
            .map_err(|e| {
                AudioError::OutputInitFailure(format!("Failed to build output stream: {}", e))
            })?;

        Ok(Self {
            stream: Some(stream),
            ring_buffer,
            spec,
            stalled: false,
        })
    }
}

impl AudioRenderer for CpalRenderer {
    fn start(&mut self) -> Result<()> {
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| {
                AudioError::OutputInitFailure(format!("Failed to start stream: {}", e))
            })?;
        }
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let written = self.ring_buffer.write_all(samples, DEVICE_STALL_TIMEOUT);
        if written < samples.len() {
            if !self.stalled {
                log::warn!(
                    "[cpal] device stalled, dropped {} samples",
                    samples.len() - written
                );
            }
            self.stalled = true;
        } else {
            self.stalled = false;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.ring_buffer.clear();
        if let Some(stream) = self.stream.take() {
            stream.pause().map_err(|e| AudioError::Io {
                kind: std::io::ErrorKind::Other,
                message: format!("Failed to stop stream: {}", e),
            })?;
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.ring_buffer.clear();
    }

    fn spec(&self) -> AudioSpec {
        self.spec
    }
}

/// Factory opening the default device through cpal
#[derive(Debug, Clone, Default)]
pub struct CpalRendererFactory {
    spec: AudioSpec,
}

impl CpalRendererFactory {
    pub fn new(spec: AudioSpec) -> Self {
        Self { spec }
    }
}

impl RendererFactory for CpalRendererFactory {
    fn create_renderer(&self, spec: AudioSpec) -> Result<Box<dyn AudioRenderer>> {
        Ok(Box::new(CpalRenderer::new(spec)?))
    }

    fn get_preferred_spec(&self) -> AudioSpec {
        self.spec
    }
}
