//! Playback Engine
//!
//! - [`clock`]: integer interrupt and pattern step clocks
//! - [`sequencer`]: pattern order walking
//! - [`track`]: per-channel note/effect compiler
//! - [`synth_effects`]: the 16 waveform effects
//! - [`player`]: [`SonicPlayer`], the pull-based sequencer/mixer

pub mod clock;
pub mod player;
pub mod sequencer;
pub mod synth_effects;
pub mod track;

pub use clock::{step_millis, InterruptClock, StepClock};
pub use player::{PlaybackPosition, SonicPlayer};
pub use sequencer::{AdvanceResult, PatternSequencer};
pub use synth_effects::EffectRunner;
pub use track::{GlobalCommand, TrackState};

use crate::constants::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE, NTSC_CLOCK_HZ, PAL_CLOCK_HZ};
use crate::{Result, SonicError};
use serde::{Deserialize, Serialize};

/// Paula master clock selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStandard {
    /// 7.09 MHz European machines
    #[default]
    Pal,
    /// 7.16 MHz American machines
    Ntsc,
}

impl VideoStandard {
    /// Master clock in Hz
    pub fn clock_hz(self) -> f64 {
        match self {
            VideoStandard::Pal => PAL_CLOCK_HZ,
            VideoStandard::Ntsc => NTSC_CLOCK_HZ,
        }
    }
}

/// Playback session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Sub-song to play
    pub song_index: usize,
    /// Output rate in Hz
    pub sample_rate: u32,
    /// Interleaved left/right output instead of mono
    pub stereo: bool,
    /// Paula clock
    pub clock: VideoStandard,
    /// Output gain (0.0..=1.0)
    pub master_volume: f32,
    /// Jump back to the repeat position instead of ending
    pub loop_song: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            song_index: 0,
            sample_rate: 44_100,
            stereo: false,
            clock: VideoStandard::Pal,
            master_volume: 1.0,
            loop_song: false,
        }
    }
}

impl PlayerConfig {
    /// Mono output at `sample_rate`
    pub fn mono(sample_rate: u32) -> Self {
        PlayerConfig {
            sample_rate,
            ..Default::default()
        }
    }

    /// Stereo output at `sample_rate`
    pub fn stereo(sample_rate: u32) -> Self {
        PlayerConfig {
            sample_rate,
            stereo: true,
            ..Default::default()
        }
    }

    /// Output channels per frame
    pub fn channels(&self) -> usize {
        if self.stereo {
            2
        } else {
            1
        }
    }

    /// Check the rate and volume bounds (the song index is checked by the player)
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(SonicError::range(format!(
                "sample rate {} outside [{MIN_SAMPLE_RATE}, {MAX_SAMPLE_RATE}]",
                self.sample_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err(SonicError::range(format!(
                "master volume {} outside [0.0, 1.0]",
                self.master_volume
            )));
        }
        Ok(())
    }
}
