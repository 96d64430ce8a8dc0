// PCM ring buffer between a blocking producer and a non-blocking consumer

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-capacity ring of interleaved f32 samples.
///
/// One slot is always kept free so that a full buffer can be told apart
/// from an empty one.
pub struct AudioRingBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
}

impl AudioRingBuffer {
    /// Ring holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity + 1],
            write_pos: 0,
            read_pos: 0,
        }
    }

    fn slots(&self) -> usize {
        self.buffer.len()
    }

    /// Copy as much of `data` as fits, returning the count written
    pub fn write(&mut self, data: &[f32]) -> usize {
        let to_write = data.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        let slots = self.slots();
        let first = to_write.min(slots - self.write_pos);
        self.buffer[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        self.buffer[..to_write - first].copy_from_slice(&data[first..to_write]);
        self.write_pos = (self.write_pos + to_write) % slots;

        to_write
    }

    /// Move up to `output.len()` samples out of the ring
    pub fn read(&mut self, output: &mut [f32]) -> usize {
        let to_read = output.len().min(self.available_read());
        if to_read == 0 {
            return 0;
        }

        let slots = self.slots();
        let first = to_read.min(slots - self.read_pos);
        output[..first].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + first]);
        output[first..to_read].copy_from_slice(&self.buffer[..to_read - first]);
        self.read_pos = (self.read_pos + to_read) % slots;

        to_read
    }

    pub fn available_write(&self) -> usize {
        self.capacity() - self.available_read()
    }

    pub fn available_read(&self) -> usize {
        (self.write_pos + self.slots() - self.read_pos) % self.slots()
    }

    pub fn capacity(&self) -> usize {
        self.slots() - 1
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
    }
}

/// Ring buffer shared between a blocking producer and a realtime consumer.
///
/// The consumer never waits; the producer parks until the consumer frees
/// space, which paces it to the device clock.
#[derive(Clone)]
pub struct SharedRingBuffer {
    inner: Arc<Shared>,
}

struct Shared {
    ring: Mutex<AudioRingBuffer>,
    space: Condvar,
}

impl SharedRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Shared {
                ring: Mutex::new(AudioRingBuffer::new(capacity)),
                space: Condvar::new(),
            }),
        }
    }

    /// Write all of `data`, waiting for the consumer when the ring is full.
    ///
    /// Gives up after `stall` without any progress and returns the count
    /// written so far, so a dead device cannot hang the producer.
    pub fn write_all(&self, data: &[f32], stall: Duration) -> usize {
        let mut written = 0;
        let mut ring = self.inner.ring.lock();

        while written < data.len() {
            let n = ring.write(&data[written..]);
            written += n;
            if written == data.len() {
                break;
            }
            if n == 0 && self.inner.space.wait_for(&mut ring, stall).timed_out() {
                break;
            }
        }

        written
    }

    /// Non-blocking read, waking a producer parked in [`write_all`](Self::write_all)
    pub fn read(&self, output: &mut [f32]) -> usize {
        let n = self.inner.ring.lock().read(output);
        if n > 0 {
            self.inner.space.notify_one();
        }
        n
    }

    pub fn available_read(&self) -> usize {
        self.inner.ring.lock().available_read()
    }

    pub fn clear(&self) {
        self.inner.ring.lock().clear();
        self.inner.space.notify_all();
    }
}
