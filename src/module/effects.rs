//! Instrument Effect Decoding
//!
//! Synth instruments carry one effect number plus three signed arguments and a
//! delay. The number is resolved once, when the instrument is triggered, into
//! an [`InstrumentEffect`] with named parameters.
//!
//! Argument conventions:
//! - `arg2..=arg3` is an inclusive byte range inside the 128-byte wave
//! - `arg1` is a delta, a threshold or a wave index depending on the effect

use super::Instrument;
use crate::constants::WAVE_TABLE_LENGTH;
use crate::{Result, SonicError};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Raw effect numbers as stored in the instrument record
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[allow(missing_docs)]
pub enum EffectKind {
    None = 0,
    WaveNegator = 1,
    FreeNegator = 2,
    RotateVertical = 3,
    RotateHorizontal = 4,
    AlienVoice = 5,
    PolyNegator = 6,
    ShackWave1 = 7,
    ShackWave2 = 8,
    Metamorph = 9,
    Laser = 10,
    WaveAlias = 11,
    NoiseGenerator = 12,
    LowPassFilter1 = 13,
    LowPassFilter2 = 14,
    Oscillator = 15,
}

impl EffectKind {
    /// Map a raw effect number, `None` for numbers above 15
    pub fn from_raw(value: u16) -> Option<Self> {
        Self::from_u16(value)
    }
}

/// Inclusive index range inside a wave table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveRange {
    /// First index
    pub start: usize,
    /// Last index (inclusive)
    pub stop: usize,
}

impl WaveRange {
    /// Range from two effect arguments; `None` when `start > stop`
    pub fn from_args(start: i16, stop: i16) -> Option<Self> {
        if start > stop {
            return None;
        }
        let clamp = |v: i16| (v.max(0) as usize).min(WAVE_TABLE_LENGTH - 1);
        Some(WaveRange {
            start: clamp(start),
            stop: clamp(stop),
        })
    }

    /// Number of indices covered
    pub fn len(&self) -> usize {
        self.stop - self.start + 1
    }

    /// Always false: a decoded range covers at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index following `pos`, wrapping back to `start` past `stop`
    pub fn next(&self, pos: usize) -> usize {
        if pos < self.start || pos >= self.stop {
            self.start
        } else {
            pos + 1
        }
    }
}

/// Decoded per-instrument waveform effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentEffect {
    /// No effect
    None,
    /// Negate one byte per run, cycling through the range
    WaveNegator {
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Negate a growing prefix read from an offset table
    FreeNegator {
        /// Wave holding the prefix lengths
        wave: usize,
        /// One-shot entries of the offset table
        length: u16,
        /// Looping entries (0 = finish when exhausted)
        repeat: u16,
    },
    /// Add a constant to every byte of the range
    RotateVertical {
        /// Byte delta
        delta: i8,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Rotate the range left by one byte
    RotateHorizontal {
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Mix another wave into the range
    AlienVoice {
        /// Wave added byte for byte
        wave: usize,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Negate one byte per run, restoring the previous one
    PolyNegator {
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Add successive bytes of another wave to the whole range
    ShackWave1 {
        /// Wave providing the deltas
        wave: usize,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// [`InstrumentEffect::ShackWave1`] plus a wave negator step
    ShackWave2 {
        /// Wave providing the deltas
        wave: usize,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Morph the range toward another wave
    Metamorph {
        /// Target wave
        wave: usize,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Period sweep that ends after a fixed number of runs
    Laser {
        /// Period offset added per run
        step: i16,
        /// Runs before the effect finishes
        runs: u16,
    },
    /// Push each byte away from its right neighbour
    WaveAlias {
        /// Amount pushed per run
        delta: i8,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// One random byte at a random position per run
    NoiseGenerator {
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Nudge bytes toward their right neighbour by one
    LowPassFilter1 {
        /// Minimum difference that triggers smoothing
        threshold: i16,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Nudge bytes toward their right neighbour by half the difference
    LowPassFilter2 {
        /// Minimum difference that triggers smoothing
        threshold: i16,
        /// Bytes affected
        range: Option<WaveRange>,
    },
    /// Swing a DC offset over the pristine wave
    Oscillator {
        /// Offset change per run
        step: i16,
        /// Bytes affected
        range: Option<WaveRange>,
    },
}

impl InstrumentEffect {
    /// Decode the effect of `instrument`.
    ///
    /// `wave_count` is the number of synth waves in the module; effects that
    /// reference a second wave fail with a format error when it is missing.
    pub fn decode(instrument: &Instrument, wave_count: usize) -> Result<Self> {
        let kind = EffectKind::from_raw(instrument.effect).ok_or_else(|| {
            SonicError::UnsupportedFeature(format!(
                "instrument '{}' uses unknown effect {}",
                instrument.name, instrument.effect
            ))
        })?;

        let a1 = instrument.effect_arg1;
        let range = WaveRange::from_args(instrument.effect_arg2, instrument.effect_arg3);
        let wave = || -> Result<usize> {
            let index = a1.max(0) as usize;
            if a1 < 0 || index >= wave_count {
                return Err(SonicError::format(format!(
                    "effect {:?} of instrument '{}' references wave {} ({} available)",
                    kind, instrument.name, a1, wave_count
                )));
            }
            Ok(index)
        };

        let effect = match kind {
            EffectKind::None => InstrumentEffect::None,
            EffectKind::WaveNegator => InstrumentEffect::WaveNegator { range },
            EffectKind::FreeNegator => InstrumentEffect::FreeNegator {
                wave: wave()?,
                length: instrument.effect_arg2.max(0) as u16,
                repeat: instrument.effect_arg3.max(0) as u16,
            },
            EffectKind::RotateVertical => InstrumentEffect::RotateVertical {
                delta: a1 as i8,
                range,
            },
            EffectKind::RotateHorizontal => InstrumentEffect::RotateHorizontal { range },
            EffectKind::AlienVoice => InstrumentEffect::AlienVoice {
                wave: wave()?,
                range,
            },
            EffectKind::PolyNegator => InstrumentEffect::PolyNegator { range },
            EffectKind::ShackWave1 => InstrumentEffect::ShackWave1 {
                wave: wave()?,
                range,
            },
            EffectKind::ShackWave2 => InstrumentEffect::ShackWave2 {
                wave: wave()?,
                range,
            },
            EffectKind::Metamorph => InstrumentEffect::Metamorph {
                wave: wave()?,
                range,
            },
            EffectKind::Laser => InstrumentEffect::Laser {
                step: a1,
                runs: instrument.effect_arg2.max(0) as u16,
            },
            EffectKind::WaveAlias => InstrumentEffect::WaveAlias {
                delta: a1 as i8,
                range,
            },
            EffectKind::NoiseGenerator => InstrumentEffect::NoiseGenerator { range },
            EffectKind::LowPassFilter1 => InstrumentEffect::LowPassFilter1 {
                threshold: a1,
                range,
            },
            EffectKind::LowPassFilter2 => InstrumentEffect::LowPassFilter2 {
                threshold: a1,
                range,
            },
            EffectKind::Oscillator => InstrumentEffect::Oscillator { step: a1, range },
        };
        Ok(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(effect: u16, a1: i16, a2: i16, a3: i16) -> Instrument {
        Instrument {
            synth: true,
            effect,
            effect_arg1: a1,
            effect_arg2: a2,
            effect_arg3: a3,
            name: "fx".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_range_from_args() {
        assert_eq!(
            WaveRange::from_args(4, 8),
            Some(WaveRange { start: 4, stop: 8 })
        );
        assert_eq!(WaveRange::from_args(9, 8), None);
        // Clamped into the table
        assert_eq!(
            WaveRange::from_args(-5, 300),
            Some(WaveRange {
                start: 0,
                stop: 127
            })
        );
        assert_eq!(WaveRange::from_args(3, 3).map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_range_next_wraps() {
        let range = WaveRange { start: 2, stop: 4 };
        assert_eq!(range.next(2), 3);
        assert_eq!(range.next(4), 2);
        assert_eq!(range.next(0), 2);
    }

    #[test]
    fn test_decode_rotate_vertical() {
        let effect = InstrumentEffect::decode(&instrument(3, -2, 0, 63), 1).unwrap();
        assert_eq!(
            effect,
            InstrumentEffect::RotateVertical {
                delta: -2,
                range: Some(WaveRange { start: 0, stop: 63 })
            }
        );
    }

    #[test]
    fn test_decode_missing_wave_is_format_error() {
        let err = InstrumentEffect::decode(&instrument(5, 3, 0, 127), 2).unwrap_err();
        assert!(matches!(err, SonicError::Format(_)));
    }

    #[test]
    fn test_decode_unknown_effect_is_unsupported() {
        let err = InstrumentEffect::decode(&instrument(16, 0, 0, 0), 0).unwrap_err();
        assert!(matches!(err, SonicError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_every_known_kind_decodes() {
        for raw in 0..16u16 {
            let effect = InstrumentEffect::decode(&instrument(raw, 0, 0, 10), 1);
            assert!(effect.is_ok(), "effect {} failed to decode", raw);
        }
    }
}
