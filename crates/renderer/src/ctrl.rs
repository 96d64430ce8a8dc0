// Stream wrappers controlled from outside the render thread

use busich_core::Streamer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Flags {
    paused: AtomicBool,
    detached: AtomicBool,
}

/// Handle flipping the flags of a [`Ctrl`] from any thread
#[derive(Debug, Clone, Default)]
pub struct CtrlHandle {
    flags: Arc<Flags>,
}

impl CtrlHandle {
    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Make the next pull report the stream as drained
    pub fn detach(&self) {
        self.flags.detached.store(true, Ordering::SeqCst);
    }

    pub fn is_detached(&self) -> bool {
        self.flags.detached.load(Ordering::SeqCst)
    }
}

/// Pause/detach gate around a stream.
///
/// While paused it emits silence without pulling the inner stream, so
/// decoding and position stand still. Once detached it yields nothing and
/// the mixer drops it.
pub struct Ctrl<S> {
    inner: S,
    handle: CtrlHandle,
}

impl<S: Streamer> Ctrl<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            handle: CtrlHandle::default(),
        }
    }

    pub fn handle(&self) -> CtrlHandle {
        self.handle.clone()
    }
}

impl<S: Streamer> Streamer for Ctrl<S> {
    fn stream(&mut self, buf: &mut [f32]) -> usize {
        if self.handle.is_detached() {
            return 0;
        }
        if self.handle.is_paused() {
            buf.fill(0.0);
            return buf.len();
        }
        self.inner.stream(buf)
    }
}

/// Runs a callback once, on the pull where the inner stream drains
pub struct Notify<S, F> {
    inner: S,
    callback: Option<F>,
}

impl<S, F> Notify<S, F>
where
    S: Streamer,
    F: FnOnce() + Send,
{
    pub fn new(inner: S, callback: F) -> Self {
        Self {
            inner,
            callback: Some(callback),
        }
    }
}

impl<S, F> Streamer for Notify<S, F>
where
    S: Streamer,
    F: FnOnce() + Send,
{
    fn stream(&mut self, buf: &mut [f32]) -> usize {
        let n = self.inner.stream(buf);
        if n < buf.len() {
            if let Some(callback) = self.callback.take() {
                callback();
            }
        }
        n
    }
}
