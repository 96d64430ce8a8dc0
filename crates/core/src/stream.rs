// Pull-based PCM stream abstraction shared by every pipeline stage

/// A source of interleaved f32 samples pulled by the render thread
pub trait Streamer: Send {
    /// Fill `buf` with samples and return how many were written.
    ///
    /// Returning fewer than `buf.len()` means the stream is drained and will
    /// not produce anything more.
    fn stream(&mut self, buf: &mut [f32]) -> usize;
}

impl<S: Streamer + ?Sized> Streamer for Box<S> {
    fn stream(&mut self, buf: &mut [f32]) -> usize {
        (**self).stream(buf)
    }
}
