// Sums every attached stream into one output buffer

use busich_core::Streamer;

/// Set of streams played together.
///
/// A stream that returns less than a full buffer is treated as drained and
/// dropped after its last samples are mixed in.
#[derive(Default)]
pub struct Mixer {
    streams: Vec<Box<dyn Streamer>>,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, stream: Box<dyn Streamer>) {
        self.streams.push(stream);
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Drop every stream without pulling it again
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    /// Fill `out` with the sum of one pull from every stream
    pub fn mix(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let Self { streams, scratch } = self;
        scratch.resize(out.len(), 0.0);

        streams.retain_mut(|stream| {
            let n = stream.stream(scratch);
            for (dst, src) in out.iter_mut().zip(&scratch[..n]) {
                *dst += *src;
            }
            n == out.len()
        });
    }
}
