//! Paula Sound Hardware Emulation
//!
//! Four independent DMA channels plus the output stage. The note/effect
//! compiler programs each channel (period, volume, source, start) and the
//! player samples all four once per output frame.

pub mod channel;
pub mod mixer;

pub use channel::{ChannelState, ChannelStatus, PaulaChannel, SourceLayout};
pub use mixer::{ChannelMask, Mixer};

use crate::constants::CHANNEL_COUNT;

/// The four Paula channels and the output mixer
#[derive(Debug, Clone)]
pub struct Paula {
    channels: [PaulaChannel; CHANNEL_COUNT],
    mixer: Mixer,
}

impl Paula {
    /// Create Paula running from `clock_hz` sampled at `sample_rate`
    pub fn new(clock_hz: f64, sample_rate: u32, master_volume: f32) -> Self {
        Paula {
            channels: std::array::from_fn(|_| PaulaChannel::new(clock_hz, sample_rate)),
            mixer: Mixer::new(master_volume, sample_rate),
        }
    }

    /// Silence every channel and clear the filter; mutes are kept
    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(PaulaChannel::reset);
        self.mixer.reset();
    }

    /// Shared access to a channel (`None` past channel 3)
    pub fn channel(&self, index: usize) -> Option<&PaulaChannel> {
        self.channels.get(index)
    }

    /// Mutable access to a channel (`None` past channel 3)
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut PaulaChannel> {
        self.channels.get_mut(index)
    }

    /// All four channels, in hardware order
    pub fn channels_mut(&mut self) -> &mut [PaulaChannel; CHANNEL_COUNT] {
        &mut self.channels
    }

    /// Output mixer
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Mutable output mixer
    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    /// Sample every channel once.
    ///
    /// `sources` yields the current source buffer of each channel.
    pub fn sample_channels<'a, F>(&mut self, mut sources: F) -> [(f32, ChannelStatus); CHANNEL_COUNT]
    where
        F: FnMut(usize) -> &'a [i8],
    {
        std::array::from_fn(|i| self.channels[i].sample(sources(i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PAL_CLOCK_HZ;

    #[test]
    fn test_paula_starts_silent() {
        let mut paula = Paula::new(PAL_CLOCK_HZ, 44_100, 1.0);
        let out = paula.sample_channels(|_| &[]);
        assert!(out.iter().all(|&(v, s)| v == 0.0 && s == ChannelStatus::Silent));
        let levels = out.map(|(v, _)| v);
        assert_eq!(paula.mixer_mut().mix_mono(&levels), 0.0);
    }

    #[test]
    fn test_channels_are_independent() {
        let data = [100i8; 8];
        let mut paula = Paula::new(PAL_CLOCK_HZ, 44_100, 1.0);
        let ch = paula.channel_mut(2).unwrap();
        ch.set_source(SourceLayout::from_words(4, 0, true, data.len()));
        ch.set_period(428);
        ch.set_volume(64);
        ch.start(0, &data);

        let out = paula.sample_channels(|_| &data);
        assert_eq!(out[0].1, ChannelStatus::Silent);
        assert_eq!(out[2].1, ChannelStatus::Playing);
        assert!(paula.channel(2).unwrap().is_playing());
        assert!(!paula.channel(3).unwrap().is_playing());

        paula.mixer_mut().set_channel_mute(2, true);
        paula.reset();
        assert!(!paula.channel(2).unwrap().is_playing());
        assert_eq!(paula.channel(2).unwrap().volume(), 0);
        assert!(paula.mixer().is_channel_muted(2));
    }

    #[test]
    fn test_channel_index_out_of_range() {
        let mut paula = Paula::new(PAL_CLOCK_HZ, 44_100, 1.0);
        assert!(paula.channel(4).is_none());
        assert!(paula.channel_mut(usize::MAX).is_none());
        paula.mixer_mut().set_channel_mute(9, true);
        assert!(!paula.mixer().is_channel_muted(9));
    }
}
