// Process-wide output sink: render lock, mixer and render thread

use crate::{AudioSpec, Mixer, RendererFactory};
use busich_core::{AudioError, Result, Streamer};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Shared audio output.
///
/// Cloning is cheap and every clone drives the same device. The device is
/// opened on first [`ensure_started`](Self::ensure_started), on a render
/// thread that repeatedly mixes one buffer under the render lock and hands
/// it to the renderer, which blocks on the device clock.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    factory: Arc<dyn RendererFactory>,
    spec: AudioSpec,
    mixer: Arc<Mutex<Mixer>>,
    flush: Arc<AtomicBool>,
    worker: Mutex<Option<RenderWorker>>,
}

struct RenderWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl OutputSink {
    pub fn new(factory: Arc<dyn RendererFactory>, spec: AudioSpec) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                factory,
                spec,
                mixer: Arc::new(Mutex::new(Mixer::new())),
                flush: Arc::new(AtomicBool::new(false)),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Sink using the factory's preferred format
    pub fn with_preferred_spec(factory: Arc<dyn RendererFactory>) -> Self {
        let spec = factory.get_preferred_spec();
        Self::new(factory, spec)
    }

    pub fn spec(&self) -> AudioSpec {
        self.inner.spec
    }

    pub fn is_started(&self) -> bool {
        self.inner
            .worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Open the device and start the render thread unless already running.
    ///
    /// A failed attempt leaves the sink stopped; the next call tries again.
    pub fn ensure_started(&self) -> Result<()> {
        let mut worker = self.inner.worker.lock();
        if let Some(current) = worker.as_ref() {
            if !current.handle.is_finished() {
                return Ok(());
            }
        }
        if let Some(dead) = worker.take() {
            log::warn!("[sink] render thread had exited, restarting");
            let _ = dead.handle.join();
        }

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let factory = self.inner.factory.clone();
        let spec = self.inner.spec;
        let mixer = self.inner.mixer.clone();
        let flush = self.inner.flush.clone();
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("busich-render".to_string())
            .spawn(move || render_loop(factory, spec, mixer, flush, thread_running, ready_tx))
            .map_err(|e| {
                AudioError::OutputInitFailure(format!("Failed to spawn render thread: {}", e))
            })?;

        let init = ready_rx.recv().unwrap_or_else(|_| {
            Err(AudioError::OutputInitFailure(
                "Render thread exited during initialization".to_string(),
            ))
        });

        match init {
            Ok(()) => {
                log::info!(
                    "[sink] output started: {} Hz x{}, {} frames per step",
                    spec.sample_rate,
                    spec.channels,
                    spec.buffer_size
                );
                *worker = Some(RenderWorker { running, handle });
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                log::error!("[sink] failed to open output: {}", e);
                if matches!(e.root(), AudioError::OutputInitFailure(_)) {
                    Err(e)
                } else {
                    Err(AudioError::OutputInitFailure(e.to_string()))
                }
            }
        }
    }

    /// Attach a stream; it plays from the next render step until drained
    pub fn play(&self, stream: Box<dyn Streamer>) {
        self.inner.mixer.lock().add(stream);
    }

    /// Take the render lock. No render step runs while the guard lives.
    pub fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.inner.mixer.lock()
    }

    /// Detach every stream
    pub fn clear(&self) {
        self.inner.mixer.lock().clear();
    }

    /// Drop audio already handed to the device, before the next render
    /// step is written. Does not wait for the render thread.
    pub fn flush(&self) {
        self.inner.flush.store(true, Ordering::SeqCst);
    }

    /// Stop the render thread and release the device
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl SinkInner {
    fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.running.store(false, Ordering::SeqCst);
            // The last handle can be released by a callback on the render thread itself
            if worker.handle.thread().id() == thread::current().id() {
                return;
            }
            if worker.handle.join().is_err() {
                log::error!("[sink] render thread panicked");
            }
            log::info!("[sink] output stopped");
        }
    }
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render_loop(
    factory: Arc<dyn RendererFactory>,
    spec: AudioSpec,
    mixer: Arc<Mutex<Mixer>>,
    flush: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    ready: mpsc::SyncSender<Result<()>>,
) {
    let opened = factory.create_renderer(spec).and_then(|mut renderer| {
        renderer.start()?;
        Ok(renderer)
    });

    let mut renderer = match opened {
        Ok(renderer) => {
            let _ = ready.send(Ok(()));
            renderer
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    drop(ready);

    let mut buf = vec![0.0f32; spec.buffer_samples()];
    while running.load(Ordering::SeqCst) {
        mixer.lock().mix(&mut buf);

        if flush.swap(false, Ordering::SeqCst) {
            renderer.flush();
        }
        if let Err(e) = renderer.write(&buf) {
            log::error!("[sink] device write failed: {}", e);
            break;
        }
    }

    if let Err(e) = renderer.stop() {
        log::warn!("[sink] failed to stop renderer: {}", e);
    }
    log::debug!("[sink] render thread exiting");
}
