//! Paula Output Mixer
//!
//! Combines the four channel outputs into mono or the fixed Amiga stereo
//! split (channels 0+3 left, 1+2 right).
//!
//! Features:
//! - Per-channel mute mask
//! - Master volume
//! - Optional "LED" low-pass filter (2-pole Butterworth at a fixed corner,
//!   independent of the output rate)
//! - Raw channel summing, clamped to [-1, 1]

use crate::constants::{CHANNEL_COUNT, LED_FILTER_CUTOFF_HZ};
use bitflags::bitflags;
use std::f32::consts::{FRAC_1_SQRT_2, PI};

bitflags! {
    /// Channel mute mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelMask: u8 {
        /// Channel 0 (left)
        const CH0 = 0x01;
        /// Channel 1 (right)
        const CH1 = 0x02;
        /// Channel 2 (right)
        const CH2 = 0x04;
        /// Channel 3 (left)
        const CH3 = 0x08;
    }
}

impl ChannelMask {
    /// Mask bit for a channel index, `None` past channel 3
    pub fn channel(index: usize) -> Option<Self> {
        (index < CHANNEL_COUNT).then(|| ChannelMask::from_bits_truncate(1 << index))
    }
}

/// Normalised biquad coefficients
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Biquad {
    /// Butterworth low-pass at `cutoff_hz`, kept below Nyquist
    fn low_pass(cutoff_hz: f32, sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as f32;
        let cutoff = cutoff_hz.min(rate * 0.45);
        let w0 = 2.0 * PI * cutoff / rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * FRAC_1_SQRT_2);
        let a0 = 1.0 + alpha;
        Biquad {
            b0: (1.0 - cos) / 2.0 / a0,
            b1: (1.0 - cos) / a0,
            b2: (1.0 - cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Filter history for one output lane (direct form I)
#[derive(Debug, Clone, Copy, Default)]
struct FilterLane {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl FilterLane {
    #[inline]
    fn process(&mut self, input: f32, coeffs: &Biquad, enabled: bool) -> f32 {
        let filtered = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;
        // History runs while bypassed so switching on does not click
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = filtered;
        if enabled {
            filtered
        } else {
            input
        }
    }
}

/// Audio Mixer - Combines all channels
#[derive(Debug, Clone)]
pub struct Mixer {
    muted: ChannelMask,
    master_volume: f32,
    filter_enabled: bool,
    coeffs: Biquad,
    lanes: [FilterLane; 2],
}

impl Mixer {
    /// Create a mixer with the given master volume (0.0..=1.0) for output at `sample_rate`
    pub fn new(master_volume: f32, sample_rate: u32) -> Self {
        Mixer {
            muted: ChannelMask::empty(),
            master_volume,
            filter_enabled: false,
            coeffs: Biquad::low_pass(LED_FILTER_CUTOFF_HZ, sample_rate),
            lanes: [FilterLane::default(); 2],
        }
    }

    /// Reset filter history and the filter switch; mutes are kept
    pub fn reset(&mut self) {
        self.filter_enabled = false;
        self.lanes = [FilterLane::default(); 2];
    }

    /// Mute or unmute a channel; indices past channel 3 are ignored
    pub fn set_channel_mute(&mut self, channel: usize, mute: bool) {
        if let Some(bit) = ChannelMask::channel(channel) {
            self.muted.set(bit, mute);
        }
    }

    /// Whether a channel is muted
    pub fn is_channel_muted(&self, channel: usize) -> bool {
        ChannelMask::channel(channel).is_some_and(|bit| self.muted.contains(bit))
    }

    /// Switch the low-pass filter
    pub fn set_filter(&mut self, enabled: bool) {
        self.filter_enabled = enabled;
    }

    /// Whether the low-pass filter is on
    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    fn gated(&self, channels: &[f32; CHANNEL_COUNT]) -> [f32; CHANNEL_COUNT] {
        let mut out = *channels;
        for (i, value) in out.iter_mut().enumerate() {
            if self.is_channel_muted(i) || !value.is_finite() {
                *value = 0.0;
            }
        }
        out
    }

    #[inline]
    fn output(&mut self, lane: usize, sum: f32) -> f32 {
        let enabled = self.filter_enabled;
        let coeffs = self.coeffs;
        self.lanes[lane]
            .process(sum * self.master_volume, &coeffs, enabled)
            .clamp(-1.0, 1.0)
    }

    /// Sum all four channels
    pub fn mix_mono(&mut self, channels: &[f32; CHANNEL_COUNT]) -> f32 {
        let ch = self.gated(channels);
        self.output(0, ch.iter().sum())
    }

    /// Left = channels 0 + 3, right = channels 1 + 2
    pub fn mix_stereo(&mut self, channels: &[f32; CHANNEL_COUNT]) -> (f32, f32) {
        let ch = self.gated(channels);
        (self.output(0, ch[0] + ch[3]), self.output(1, ch[1] + ch[2]))
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(1.0, 44_100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mono_sums_and_clamps() {
        let mut mixer = Mixer::default();
        assert_abs_diff_eq!(mixer.mix_mono(&[0.25, 0.25, 0.0, 0.0]), 0.5);
        assert_abs_diff_eq!(mixer.mix_mono(&[1.0, 1.0, 1.0, 0.0]), 1.0);
        assert_abs_diff_eq!(mixer.mix_mono(&[-1.0, -1.0, 0.0, 0.0]), -1.0);
    }

    #[test]
    fn test_stereo_channel_assignment() {
        let mut mixer = Mixer::default();
        let (l, r) = mixer.mix_stereo(&[0.1, 0.2, 0.3, 0.4]);
        assert_abs_diff_eq!(l, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(r, 0.5, epsilon = 1e-6);
        let (l, r) = mixer.mix_stereo(&[0.5, 0.0, 0.0, 0.0]);
        assert_abs_diff_eq!(l, 0.5);
        assert_abs_diff_eq!(r, 0.0);
    }

    #[test]
    fn test_mute_and_master_volume() {
        let mut mixer = Mixer::new(0.5, 44_100);
        mixer.set_channel_mute(1, true);
        assert!(mixer.is_channel_muted(1));
        assert!(!mixer.is_channel_muted(0));
        assert_abs_diff_eq!(mixer.mix_mono(&[0.4, 0.9, 0.0, 0.2]), 0.3, epsilon = 1e-6);
    }

    /// Ratio of output to input RMS for a sine through the filtered mono path
    fn filter_gain(sample_rate: u32, freq: f32) -> f32 {
        let mut mixer = Mixer::new(1.0, sample_rate);
        mixer.set_filter(true);
        let step = 2.0 * std::f64::consts::PI * freq as f64 / sample_rate as f64;
        let settle = sample_rate as usize / 10;
        let mut energy = 0.0f64;
        // One second holds a whole number of periods for integer `freq`
        for n in 0..settle + sample_rate as usize {
            let x = 0.5 * (step * n as f64).sin() as f32;
            let y = mixer.mix_mono(&[x, 0.0, 0.0, 0.0]);
            if n >= settle {
                energy += (y as f64) * (y as f64);
            }
        }
        let rms = (energy / sample_rate as f64).sqrt();
        (rms / (0.5 / 2f64.sqrt())) as f32
    }

    #[test]
    fn test_filter_cutoff_is_rate_independent() {
        let at_48k = filter_gain(48_000, 4_000.0);
        let at_200k = filter_gain(200_000, 4_000.0);
        let at_16k = filter_gain(16_000, 4_000.0);
        assert!(at_48k > 0.45 && at_48k < 0.65, "gain at 48k: {at_48k}");
        assert_abs_diff_eq!(at_48k, at_200k, epsilon = 0.02);
        assert_abs_diff_eq!(at_16k, at_200k, epsilon = 0.08);
    }

    #[test]
    fn test_filter_passes_low_frequencies() {
        assert_abs_diff_eq!(filter_gain(44_100, 500.0), 1.0, epsilon = 0.01);
        assert_abs_diff_eq!(filter_gain(2_000, 100.0), 1.0, epsilon = 0.02);
    }

    #[test]
    fn test_filter_bypass_is_transparent() {
        let mut mixer = Mixer::default();
        for _ in 0..8 {
            mixer.mix_mono(&[0.7, 0.0, 0.0, 0.0]);
        }
        assert_abs_diff_eq!(mixer.mix_mono(&[-0.3, 0.0, 0.0, 0.0]), -0.3);
        mixer.set_filter(true);
        let filtered = mixer.mix_mono(&[-0.3, 0.0, 0.0, 0.0]);
        assert!(filtered > -0.3, "filtered step should lag: {filtered}");
    }

    #[test]
    fn test_out_of_range_channel_mute_is_ignored() {
        let mut mixer = Mixer::default();
        assert!(ChannelMask::channel(8).is_none());
        assert_eq!(ChannelMask::channel(3), Some(ChannelMask::CH3));
        mixer.set_channel_mute(8, true);
        mixer.set_channel_mute(usize::MAX, true);
        assert!(!mixer.is_channel_muted(8));
        assert_abs_diff_eq!(mixer.mix_mono(&[0.1, 0.1, 0.1, 0.1]), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_non_finite_input_is_silenced() {
        let mut mixer = Mixer::default();
        assert_eq!(mixer.mix_mono(&[f32::NAN, 0.0, 0.0, f32::INFINITY]), 0.0);
    }
}
