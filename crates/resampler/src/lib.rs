// Audio resampling and channel conversion

use busich_core::Streamer;

/// Input frames pulled from the inner stream per refill
const INPUT_CHUNK_FRAMES: usize = 1024;

/// Check if resampling is needed
pub fn needs_resampling(
    input_rate: u32,
    output_rate: u32,
    input_channels: u16,
    output_channels: u16,
) -> bool {
    input_rate != output_rate || input_channels != output_channels
}

/// Convert one frame between channel layouts
fn convert_frame(input: &[f32], output: &mut [f32]) {
    match (input.len(), output.len()) {
        (i, o) if i == o => output.copy_from_slice(input),
        // Mono to anything: duplicate
        (1, _) => output.fill(input[0]),
        // Anything to mono: average
        (i, 1) => output[0] = input.iter().sum::<f32>() / i as f32,
        (i, _) => {
            for (c, sample) in output.iter_mut().enumerate() {
                *sample = input[c % i];
            }
        }
    }
}

/// Streaming resampler converting sample rate and channel count.
///
/// Uses linear interpolation and keeps the last input frame across pulls,
/// so chunk boundaries do not click.
pub struct Resample<S> {
    inner: S,
    input_channels: usize,
    output_channels: usize,
    /// Input frames advanced per output frame
    step: f64,
    same_rate: bool,
    passthrough: bool,
    frac: f64,
    prev: Vec<f32>,
    next: Vec<f32>,
    input: Vec<f32>,
    input_pos: usize,
    input_done: bool,
    primed: bool,
    exhausted: bool,
}

impl<S: Streamer> Resample<S> {
    pub fn new(
        inner: S,
        input_rate: u32,
        output_rate: u32,
        input_channels: u16,
        output_channels: u16,
    ) -> Self {
        let input_rate = input_rate.max(1);
        let output_rate = output_rate.max(1);
        let input_channels = input_channels.max(1);
        let output_channels = output_channels.max(1);

        if needs_resampling(input_rate, output_rate, input_channels, output_channels) {
            log::debug!(
                "Resampling {} Hz x{} -> {} Hz x{}",
                input_rate,
                input_channels,
                output_rate,
                output_channels
            );
        }

        Self {
            inner,
            input_channels: input_channels as usize,
            output_channels: output_channels as usize,
            step: input_rate as f64 / output_rate as f64,
            same_rate: input_rate == output_rate,
            passthrough: !needs_resampling(input_rate, output_rate, input_channels, output_channels),
            frac: 0.0,
            prev: vec![0.0; output_channels as usize],
            next: vec![0.0; output_channels as usize],
            input: Vec::new(),
            input_pos: 0,
            input_done: false,
            primed: false,
            exhausted: false,
        }
    }

    /// Pull one input frame, converted to the output layout, into `dst`
    fn pull_frame(&mut self, dst: &mut [f32]) -> bool {
        if self.input_pos + self.input_channels > self.input.len() {
            if self.input_done {
                return false;
            }

            let requested = INPUT_CHUNK_FRAMES * self.input_channels;
            self.input.resize(requested, 0.0);
            let n = self.inner.stream(&mut self.input);
            if n < requested {
                self.input_done = true;
            }
            self.input.truncate(n - n % self.input_channels);
            self.input_pos = 0;

            if self.input.is_empty() {
                return false;
            }
        }

        let frame = &self.input[self.input_pos..self.input_pos + self.input_channels];
        convert_frame(frame, dst);
        self.input_pos += self.input_channels;
        true
    }

    /// Shift `next` into `prev` and pull a new `next`
    fn advance(&mut self) -> bool {
        std::mem::swap(&mut self.prev, &mut self.next);
        let mut next = std::mem::take(&mut self.next);
        let ok = self.pull_frame(&mut next);
        self.next = next;
        ok
    }

    fn stream_channels_only(&mut self, buf: &mut [f32]) -> usize {
        let out_ch = self.output_channels;
        let mut written = 0;
        for out in buf.chunks_exact_mut(out_ch) {
            if !self.pull_frame(out) {
                self.exhausted = true;
                break;
            }
            written += out_ch;
        }
        written
    }
}

impl<S: Streamer> Streamer for Resample<S> {
    fn stream(&mut self, buf: &mut [f32]) -> usize {
        if self.passthrough {
            return self.inner.stream(buf);
        }
        if self.exhausted {
            return 0;
        }
        if self.same_rate {
            return self.stream_channels_only(buf);
        }

        if !self.primed {
            self.primed = true;
            // Load the first two frames into prev/next
            if !self.advance() || !self.advance() {
                self.exhausted = true;
                return 0;
            }
        }

        let out_ch = self.output_channels;
        let frames = buf.len() / out_ch;
        let mut written = 0;

        while written < frames {
            while self.frac >= 1.0 {
                if !self.advance() {
                    self.exhausted = true;
                    break;
                }
                self.frac -= 1.0;
            }
            if self.exhausted {
                break;
            }

            let t = self.frac as f32;
            let out = &mut buf[written * out_ch..(written + 1) * out_ch];
            for (c, sample) in out.iter_mut().enumerate() {
                *sample = self.prev[c] + (self.next[c] - self.prev[c]) * t;
            }

            written += 1;
            self.frac += self.step;
        }

        written * out_ch
    }
}
