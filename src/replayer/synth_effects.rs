//! Synth Waveform Effects
//!
//! Runs an instrument's [`InstrumentEffect`] against the track's private
//! working copy of its waveform. The shared wave tables are only read.
//!
//! Byte arithmetic wraps like 68000 byte operations except where an effect
//! saturates explicitly.

use crate::constants::WAVE_TABLE_LENGTH;
use crate::module::{InstrumentEffect, WaveRange, WaveTable};

/// Simple PRNG for the noise generator
fn std_lib_rand(seed: &mut u32) -> u16 {
    *seed = seed.wrapping_mul(214013).wrapping_add(2531011);
    ((*seed >> 16) & 0x7fff) as u16
}

/// Per-trigger effect state
#[derive(Debug, Clone)]
pub struct EffectRunner {
    effect: InstrumentEffect,
    delay: u16,
    counter: u16,
    /// Running position for the negators
    cursor: Option<usize>,
    /// Offset table index for the free negator
    run_index: usize,
    /// Read position in the shack wave
    shack: usize,
    oscillator_offset: i32,
    oscillator_direction: i32,
    laser_offset: i32,
    laser_runs: u16,
    rng: u32,
    finished: bool,
}

impl EffectRunner {
    /// Start `effect`, running every `delay` interrupts (0 and 1 = every one)
    pub fn new(effect: InstrumentEffect, delay: u16, seed: u32) -> Self {
        EffectRunner {
            effect,
            delay,
            counter: 0,
            cursor: None,
            run_index: 0,
            shack: 0,
            oscillator_offset: 0,
            oscillator_direction: 1,
            laser_offset: 0,
            laser_runs: 0,
            rng: seed,
            finished: matches!(effect, InstrumentEffect::None),
        }
    }

    /// Decoded effect
    pub fn effect(&self) -> InstrumentEffect {
        self.effect
    }

    /// Whether the effect has run its course
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Period offset accumulated by the laser effect
    pub fn period_offset(&self) -> i32 {
        self.laser_offset
    }

    /// Advance one interrupt; runs the effect when its delay has elapsed
    pub fn tick(&mut self, working: &mut [i8], pristine: &WaveTable, waves: &[WaveTable]) {
        if self.finished || working.len() < WAVE_TABLE_LENGTH {
            return;
        }
        self.counter += 1;
        if self.counter < self.delay.max(1) {
            return;
        }
        self.counter = 0;
        self.run(working, pristine, waves);
    }

    fn run(&mut self, working: &mut [i8], pristine: &WaveTable, waves: &[WaveTable]) {
        match self.effect {
            InstrumentEffect::None => {}
            InstrumentEffect::WaveNegator { range } => {
                if let Some(range) = range {
                    self.negate_next(working, range);
                }
            }
            InstrumentEffect::FreeNegator {
                wave,
                length,
                repeat,
            } => {
                let Some(table) = waves.get(wave) else { return };
                let offset = (table.byte(self.run_index) & 0x7f) as usize;
                for (i, dst) in working.iter_mut().enumerate().take(WAVE_TABLE_LENGTH) {
                    let value = pristine.signed(i);
                    *dst = if i < offset { value.wrapping_neg() } else { value };
                }
                self.run_index += 1;
                let (length, repeat) = (length.max(1) as usize, repeat as usize);
                if self.run_index >= length + repeat {
                    if repeat == 0 {
                        self.run_index = length - 1;
                        self.finished = true;
                    } else {
                        self.run_index = length;
                    }
                }
            }
            InstrumentEffect::RotateVertical { delta, range } => {
                if let Some(range) = range {
                    for b in &mut working[range.start..=range.stop] {
                        *b = b.wrapping_add(delta);
                    }
                }
            }
            InstrumentEffect::RotateHorizontal { range } => {
                if let Some(range) = range {
                    working[range.start..=range.stop].rotate_left(1);
                }
            }
            InstrumentEffect::AlienVoice { wave, range } => {
                if let (Some(range), Some(table)) = (range, waves.get(wave)) {
                    for i in range.start..=range.stop {
                        working[i] = working[i].wrapping_add(table.signed(i));
                    }
                }
            }
            InstrumentEffect::PolyNegator { range } => {
                if let Some(range) = range {
                    if let Some(previous) = self.cursor {
                        working[previous] = pristine.signed(previous);
                    }
                    self.negate_next(working, range);
                }
            }
            InstrumentEffect::ShackWave1 { wave, range } => {
                self.shack_step(working, wave, range, waves);
            }
            InstrumentEffect::ShackWave2 { wave, range } => {
                self.shack_step(working, wave, range, waves);
                if let Some(range) = range {
                    self.negate_next(working, range);
                }
            }
            InstrumentEffect::Metamorph { wave, range } => {
                if let (Some(range), Some(target)) = (range, waves.get(wave)) {
                    let mut done = true;
                    for i in range.start..=range.stop {
                        let goal = target.signed(i);
                        let b = &mut working[i];
                        if *b < goal {
                            *b += 1;
                        } else if *b > goal {
                            *b -= 1;
                        }
                        done &= *b == goal;
                    }
                    self.finished = done;
                }
            }
            InstrumentEffect::Laser { step, runs } => {
                if self.laser_runs < runs {
                    self.laser_offset += step as i32;
                    self.laser_runs += 1;
                }
                self.finished = self.laser_runs >= runs;
            }
            InstrumentEffect::WaveAlias { delta, range } => {
                if let Some(range) = range {
                    for i in range.start..range.stop {
                        let (left, right) = (working[i], working[i + 1]);
                        if left > right {
                            working[i] = left.saturating_add(delta);
                        } else if left < right {
                            working[i] = left.saturating_sub(delta);
                        }
                    }
                }
            }
            InstrumentEffect::NoiseGenerator { range } => {
                if let Some(range) = range {
                    let index = range.start + std_lib_rand(&mut self.rng) as usize % range.len();
                    working[index] = (std_lib_rand(&mut self.rng) >> 7) as u8 as i8;
                }
            }
            InstrumentEffect::LowPassFilter1 { threshold, range } => {
                Self::smooth(working, range, threshold, |diff| diff.signum());
            }
            InstrumentEffect::LowPassFilter2 { threshold, range } => {
                Self::smooth(working, range, threshold, |diff| diff / 2);
            }
            InstrumentEffect::Oscillator { step, range } => {
                self.oscillator_offset += self.oscillator_direction * step as i32;
                if self.oscillator_offset.abs() >= 64 {
                    self.oscillator_direction = -self.oscillator_direction;
                }
                if let Some(range) = range {
                    for i in range.start..=range.stop {
                        let value = pristine.signed(i) as i32 + self.oscillator_offset;
                        working[i] = value.clamp(i8::MIN as i32, i8::MAX as i32) as i8;
                    }
                }
            }
        }
    }

    /// Negate the byte after the cursor, cycling through `range`
    fn negate_next(&mut self, working: &mut [i8], range: WaveRange) {
        let pos = match self.cursor {
            None => range.start,
            Some(pos) => range.next(pos),
        };
        working[pos] = working[pos].wrapping_neg();
        self.cursor = Some(pos);
    }

    fn shack_step(
        &mut self,
        working: &mut [i8],
        wave: usize,
        range: Option<WaveRange>,
        waves: &[WaveTable],
    ) {
        let (Some(range), Some(table)) = (range, waves.get(wave)) else {
            return;
        };
        let delta = table.signed(self.shack);
        for b in &mut working[range.start..=range.stop] {
            *b = b.wrapping_add(delta);
        }
        self.shack = (self.shack + 1) % WAVE_TABLE_LENGTH;
    }

    /// Move each byte toward its right neighbour when they differ by more
    /// than `threshold`
    fn smooth(
        working: &mut [i8],
        range: Option<WaveRange>,
        threshold: i16,
        step: impl Fn(i16) -> i16,
    ) {
        let Some(range) = range else { return };
        for i in range.start..range.stop {
            let left = working[i] as i16;
            let diff = working[i + 1] as i16 - left;
            if diff.abs() > threshold {
                working[i] = (left + step(diff)) as i8;
            }
        }
    }
}
