//! Pre-sized sample ring
//!
//! Holds rendered PCM between the engine (producer) and `read` (consumer).
//! Both run on the caller's thread, so positions are plain counters.
//! Memory is fixed at construction regardless of song length.

use crate::{Result, SonicError};

/// Fixed-capacity FIFO of samples
#[derive(Debug, Clone)]
pub struct SampleRing<T> {
    buffer: Vec<T>,
    /// Total samples ever written
    write_pos: usize,
    /// Total samples ever read
    read_pos: usize,
    /// Capacity (power of 2)
    capacity: usize,
    /// `pos & mask == pos % capacity`
    mask: usize,
}

impl<T: Copy + Default> SampleRing<T> {
    /// Create a ring holding at least `requested_capacity` samples.
    ///
    /// Capacity is rounded up to the next power of 2.
    ///
    /// # Errors
    ///
    /// `Range` if the requested capacity is 0 or exceeds 512 MB of samples.
    pub fn new(requested_capacity: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(SonicError::range("ring capacity must be greater than 0"));
        }

        const MAX_BYTES: usize = 512 * 1024 * 1024;
        let capacity = requested_capacity.next_power_of_two();
        if capacity.saturating_mul(std::mem::size_of::<T>()) > MAX_BYTES {
            return Err(SonicError::range(format!(
                "ring capacity {capacity} exceeds maximum safe size"
            )));
        }

        Ok(SampleRing {
            buffer: vec![T::default(); capacity],
            write_pos: 0,
            read_pos: 0,
            capacity,
            mask: capacity - 1,
        })
    }

    /// Total slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples waiting to be read
    pub fn available_read(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Free slots
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Append as many of `samples` as fit; returns the count written
    pub fn write(&mut self, samples: &[T]) -> usize {
        let to_write = samples.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        let write_idx = self.write_pos & self.mask;
        if write_idx + to_write <= self.capacity {
            self.buffer[write_idx..write_idx + to_write].copy_from_slice(&samples[..to_write]);
        } else {
            let first_part = self.capacity - write_idx;
            self.buffer[write_idx..].copy_from_slice(&samples[..first_part]);
            self.buffer[..to_write - first_part].copy_from_slice(&samples[first_part..to_write]);
        }

        self.write_pos += to_write;
        to_write
    }

    /// Append one sample; returns `false` when full
    pub fn push(&mut self, sample: T) -> bool {
        if self.available_write() == 0 {
            return false;
        }
        self.buffer[self.write_pos & self.mask] = sample;
        self.write_pos += 1;
        true
    }

    /// Move up to `dest.len()` samples out; returns the count read
    pub fn read(&mut self, dest: &mut [T]) -> usize {
        let to_read = dest.len().min(self.available_read());
        if to_read == 0 {
            return 0;
        }

        let read_idx = self.read_pos & self.mask;
        if read_idx + to_read <= self.capacity {
            dest[..to_read].copy_from_slice(&self.buffer[read_idx..read_idx + to_read]);
        } else {
            let first_part = self.capacity - read_idx;
            dest[..first_part].copy_from_slice(&self.buffer[read_idx..]);
            dest[first_part..to_read].copy_from_slice(&self.buffer[..to_read - first_part]);
        }

        self.read_pos += to_read;
        to_read
    }

    /// Drop everything pending
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
    }
}
