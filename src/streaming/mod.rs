//! Sample buffering between the engine and the pull API

pub mod ring_buffer;

pub use ring_buffer::SampleRing;

/// Seconds of audio the engine renders per refill
pub const REFILL_SECONDS: usize = 1;

/// Ring size in frames for `sample_rate`: one refill plus one maximal read
pub fn ring_frames(sample_rate: u32) -> usize {
    sample_rate as usize * (REFILL_SECONDS + 1) + 1
}
