//! Per-channel note/effect compiler
//!
//! One [`TrackState`] per Paula channel. Note events arrive once per pattern
//! step through [`TrackState::play_note`]; [`TrackState::tick`] runs once per
//! interrupt and pushes the resulting period and volume into the channel.
//!
//! Tick order: vibrato, AMF, fine tune drift, synth effect, ADSR, then the
//! period clamp and the channel update.

use super::synth_effects::EffectRunner;
use crate::constants::{
    period_for_pitch, FADE_OUT_STEP, FINETUNE_DECAY, MAX_PITCH, MAX_SPEED, MAX_VOLUME, MIN_PERIOD,
    NOTE_OFF, NOTE_RESERVED, VIBRATO_TABLE, WAVE_TABLE_LENGTH,
};
use crate::module::{Instrument, InstrumentEffect, Module, Note, NoteFlags, Voice};
use crate::paula::{PaulaChannel, SourceLayout};
use crate::{Result, SonicError};

/// Note commands that affect the whole player rather than one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCommand {
    /// New pattern step speed (already clamped to 0..=16)
    SetSpeed(u16),
    /// Hardware low-pass filter switch
    SetFilter(bool),
}

/// Where the channel's bytes come from
#[derive(Debug, Clone)]
enum Source {
    None,
    /// Module sample, read in place
    Sample(usize),
    /// Private copy of a synth wave, mutated by effects
    Wave { index: usize, working: Vec<i8> },
}

/// Runtime state of one channel
#[derive(Debug, Clone)]
pub struct TrackState {
    channel: usize,
    /// 0-based instrument index
    instrument: Option<usize>,
    pitch: u8,
    source: Source,
    base_period: i32,
    fine_tuning: i32,
    first_tick: bool,
    /// Base volume (instrument volume or set-volume command)
    volume: u8,
    /// Volume last pushed to Paula
    output_volume: u8,
    vib_index: u8,
    vib_counter: u16,
    vib_offset: i32,
    amf_index: usize,
    amf_counter: u16,
    adsr_index: usize,
    adsr_counter: u16,
    adsr_sustain: bool,
    effect: Option<EffectRunner>,
    fading: bool,
    fade_volume: u8,
    portamento: u16,
    dma_finished: bool,
}

impl TrackState {
    /// Fresh state for Paula channel `channel`
    pub fn new(channel: usize) -> Self {
        TrackState {
            channel,
            instrument: None,
            pitch: 0,
            source: Source::None,
            base_period: 0,
            fine_tuning: 0,
            first_tick: false,
            volume: 0,
            output_volume: 0,
            vib_index: 0,
            vib_counter: 0,
            vib_offset: 0,
            amf_index: 0,
            amf_counter: 0,
            adsr_index: 0,
            adsr_counter: 0,
            adsr_sustain: false,
            effect: None,
            fading: false,
            fade_volume: 0,
            portamento: 0,
            dma_finished: false,
        }
    }

    /// Current source bytes for the Paula channel
    pub fn source<'a>(&'a self, module: &'a Module) -> &'a [i8] {
        match &self.source {
            Source::None => &[],
            Source::Sample(index) => module.samples.get(*index).map(|s| s.data()).unwrap_or(&[]),
            Source::Wave { working, .. } => working.as_slice(),
        }
    }

    /// Volume last pushed to the channel (0..=64)
    pub fn volume(&self) -> u8 {
        self.output_volume
    }

    /// Pitch currently held (0 before the first note)
    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    /// 0-based index of the active instrument
    pub fn instrument(&self) -> Option<usize> {
        self.instrument
    }

    /// Whether the channel is fading out after a note-off or envelope end
    pub fn is_fading(&self) -> bool {
        self.fading
    }

    /// Stored portamento speed
    pub fn portamento(&self) -> u16 {
        self.portamento
    }

    /// Whether the last started sample ran out without a loop
    pub fn is_dma_finished(&self) -> bool {
        self.dma_finished
    }

    /// Paula reported that a one-shot source ran out; the track goes quiet
    /// until the next trigger
    pub fn channel_finished(&mut self) {
        self.dma_finished = true;
        self.output_volume = 0;
    }

    /// Handle the note event of one pattern step.
    ///
    /// `now` is the sample index used as the channel start time.
    pub fn play_note(
        &mut self,
        note: &Note,
        voice: &Voice,
        module: &Module,
        channel: &mut PaulaChannel,
        now: u64,
    ) -> Result<Option<GlobalCommand>> {
        match note.pitch {
            NOTE_OFF => self.note_off(channel),
            NOTE_RESERVED => {}
            0 => {
                if let Some(number) = self.transposed_instrument(note, voice, module)? {
                    if self.pitch == 0 {
                        tracing::warn!(
                            channel = self.channel,
                            "instrument change without a previous pitch ignored"
                        );
                    } else {
                        self.trigger(self.pitch, number, module, channel, now)?;
                    }
                }
            }
            raw => {
                let transpose = if note.flags.contains(NoteFlags::DISABLE_NOTE_TRANSPOSE) {
                    0
                } else {
                    voice.note_transpose as i32
                };
                let pitch = raw as i32 + transpose;
                if !(1..=MAX_PITCH as i32).contains(&pitch) {
                    tracing::warn!(
                        channel = self.channel,
                        pitch,
                        "transposed pitch out of range, note ignored"
                    );
                } else {
                    match self.transposed_instrument(note, voice, module)? {
                        Some(number) => self.trigger(pitch as u8, number, module, channel, now)?,
                        None => self.rearm(pitch as u8, module, channel),
                    }
                }
            }
        }

        self.command(note, channel)
    }

    /// 1-based instrument after transpose; `None` keeps the current one
    fn transposed_instrument(
        &self,
        note: &Note,
        voice: &Voice,
        module: &Module,
    ) -> Result<Option<usize>> {
        if note.instrument == 0 {
            return Ok(None);
        }
        let transpose = if note.flags.contains(NoteFlags::DISABLE_INSTRUMENT_TRANSPOSE) {
            0
        } else {
            voice.instrument_transpose as i32
        };
        let number = note.instrument as i32 + transpose;
        if number <= 0 {
            return Ok(None);
        }
        let number = number as usize;
        if module.instrument(number).is_none() {
            return Err(SonicError::format(format!(
                "note references instrument {} but the module has {}",
                number,
                module.instruments.len()
            )));
        }
        Ok(Some(number))
    }

    fn note_off(&mut self, channel: &mut PaulaChannel) {
        self.output_volume = 0;
        self.fade_volume = 0;
        self.fading = true;
        self.effect = None;
        channel.set_volume(0);
        channel.stop();
    }

    /// Reset the per-note counters for the current instrument
    fn reset_counters(&mut self, instrument: Option<&Instrument>) {
        self.fine_tuning = instrument.map_or(0, |i| i.fine_tuning as i32);
        self.first_tick = true;
        self.vib_index = 0;
        self.vib_counter = 0;
        self.vib_offset = 0;
        self.amf_index = 0;
        self.amf_counter = 0;
        self.adsr_index = 0;
        self.adsr_counter = 0;
        self.adsr_sustain = false;
        self.fading = false;
        self.fade_volume = 0;
    }

    /// New pitch on the running instrument: counters restart, the sample keeps playing
    fn rearm(&mut self, pitch: u8, module: &Module, channel: &mut PaulaChannel) {
        self.pitch = pitch;
        self.base_period = period_for_pitch(pitch).map_or(0, |p| p as i32);
        let instrument = self.instrument.and_then(|i| module.instruments.get(i));
        self.reset_counters(instrument);
        if let Some(effect) = self.effect.as_ref().map(EffectRunner::effect) {
            let delay = instrument.map_or(0, |i| i.effect_delay);
            self.effect = Some(EffectRunner::new(effect, delay, self.seed()));
        }
        channel.set_period(Self::clamp_period(self.base_period));
    }

    /// Load instrument `number` (1-based) at `pitch` and start the channel
    fn trigger(
        &mut self,
        pitch: u8,
        number: usize,
        module: &Module,
        channel: &mut PaulaChannel,
        now: u64,
    ) -> Result<()> {
        let instrument = module.instrument(number).ok_or_else(|| {
            SonicError::format(format!(
                "instrument {} out of range ({} available)",
                number,
                module.instruments.len()
            ))
        })?;
        let index = number - 1;
        Self::validate_tables(instrument, module)?;

        let (source, effect) = if instrument.synth {
            let wave_index = instrument.source_index as usize;
            let wave = module.waves.get(wave_index).ok_or_else(|| {
                SonicError::format(format!(
                    "instrument '{}' uses synth wave {} ({} available)",
                    instrument.name,
                    wave_index,
                    module.waves.len()
                ))
            })?;
            let effect = InstrumentEffect::decode(instrument, module.waves.len())?;
            (
                Source::Wave {
                    index: wave_index,
                    working: wave.to_signed(),
                },
                Some(EffectRunner::new(effect, instrument.effect_delay, self.seed())),
            )
        } else {
            let sample_index = instrument.source_index as usize;
            if sample_index >= module.samples.len() {
                return Err(SonicError::format(format!(
                    "instrument '{}' uses sample {} ({} available)",
                    instrument.name,
                    sample_index,
                    module.samples.len()
                )));
            }
            (Source::Sample(sample_index), None)
        };

        self.instrument = Some(index);
        self.pitch = pitch;
        self.source = source;
        self.effect = effect;
        self.base_period = period_for_pitch(pitch).map_or(0, |p| p as i32);
        self.volume = instrument.volume.min(MAX_VOLUME as u16) as u8;
        self.output_volume = self.volume;
        self.dma_finished = false;
        self.reset_counters(Some(instrument));

        let bytes = self.source(module);
        let layout =
            SourceLayout::from_words(instrument.length, instrument.repeat, instrument.synth, bytes.len());
        channel.set_source(layout);
        channel.set_period(Self::clamp_period(self.base_period));
        channel.set_volume(self.volume);
        channel.start(now, bytes);
        Ok(())
    }

    fn validate_tables(instrument: &Instrument, module: &Module) -> Result<()> {
        if instrument.has_adsr() && instrument.adsr_wave as usize >= module.adsr_waves.len() {
            return Err(SonicError::format(format!(
                "instrument '{}' uses ADSR table {} ({} available)",
                instrument.name,
                instrument.adsr_wave,
                module.adsr_waves.len()
            )));
        }
        if instrument.has_amf() && instrument.amf_wave as usize >= module.amf_waves.len() {
            return Err(SonicError::format(format!(
                "instrument '{}' uses AMF table {} ({} available)",
                instrument.name,
                instrument.amf_wave,
                module.amf_waves.len()
            )));
        }
        Ok(())
    }

    fn seed(&self) -> u32 {
        0x2545_F491 ^ self.channel as u32
    }

    fn command(&mut self, note: &Note, channel: &mut PaulaChannel) -> Result<Option<GlobalCommand>> {
        let param = note.param;
        match note.command {
            0x0 => Ok(None),
            0x2 => {
                self.adsr_index = (param as usize).min(WAVE_TABLE_LENGTH - 1);
                self.adsr_counter = 0;
                Ok(None)
            }
            0x7 => {
                self.portamento = param as u16;
                Ok(None)
            }
            0x8 => {
                self.portamento = 0;
                Ok(None)
            }
            0xC => {
                self.volume = param.min(MAX_VOLUME);
                self.fade_volume = self.volume;
                if !self.fading {
                    self.output_volume = self.volume;
                    channel.set_volume(self.volume);
                }
                Ok(None)
            }
            0xE => Ok(Some(GlobalCommand::SetFilter(param != 0))),
            0xF => Ok(Some(GlobalCommand::SetSpeed((param as u16).min(MAX_SPEED)))),
            other => Err(SonicError::UnsupportedFeature(format!(
                "note command {other:#x} (parameter {param:#04x}) on channel {}",
                self.channel
            ))),
        }
    }

    #[inline]
    fn clamp_period(period: i32) -> u16 {
        period.clamp(MIN_PERIOD as i32, u16::MAX as i32) as u16
    }

    /// One interrupt: compute period and volume and push them to `channel`
    pub fn tick(&mut self, module: &Module, channel: &mut PaulaChannel) {
        if self.dma_finished {
            return;
        }
        if self.fading {
            self.fade_volume = self.fade_volume.saturating_sub(FADE_OUT_STEP);
            self.output_volume = self.fade_volume;
            channel.set_volume(self.fade_volume);
            if self.fade_volume == 0 && channel.is_playing() {
                channel.stop();
            }
            return;
        }
        let Some(instrument) = self.instrument.and_then(|i| module.instruments.get(i)) else {
            return;
        };

        let vibrato = self.vibrato(instrument);
        let amf = self.amf(instrument, module);

        if self.first_tick {
            self.first_tick = false;
        } else {
            self.base_period -= self.fine_tuning;
            self.fine_tuning -= self.fine_tuning.signum() * FINETUNE_DECAY;
        }

        let mut laser = 0;
        if let (Some(runner), Source::Wave { index, working }) = (&mut self.effect, &mut self.source) {
            if let Some(pristine) = module.waves.get(*index) {
                runner.tick(working, pristine, &module.waves);
            }
            laser = runner.period_offset();
        }

        let (volume, envelope_done) = self.adsr(instrument, module);
        self.output_volume = volume;

        let period = Self::clamp_period(self.base_period + vibrato - amf + laser);
        channel.set_period(period);
        channel.set_volume(volume);

        if envelope_done {
            self.fading = true;
            self.fade_volume = volume;
            self.effect = None;
        }
    }

    /// Vibrato period offset
    fn vibrato(&mut self, instrument: &Instrument) -> i32 {
        if instrument.vib_level == 0 {
            return 0;
        }
        self.vib_counter += 1;
        if self.vib_counter >= instrument.vib_delay.max(1) {
            self.vib_counter = 0;
            let depth = VIBRATO_TABLE[self.vib_index as usize] as i32;
            self.vib_offset = depth * 4 / instrument.vib_level as i32;
            self.vib_index = self.vib_index.wrapping_add(instrument.vib_speed as u8);
        }
        self.vib_offset
    }

    /// AMF period offset
    fn amf(&mut self, instrument: &Instrument, module: &Module) -> i32 {
        if !instrument.has_amf() {
            return 0;
        }
        let Some(table) = module.amf_waves.get(instrument.amf_wave as usize) else {
            return 0;
        };
        let offset = table.signed(self.amf_index) as i32;

        self.amf_counter += 1;
        if self.amf_counter >= instrument.amf_delay.max(1) {
            self.amf_counter = 0;
            self.amf_index = Self::step_table(
                self.amf_index,
                instrument.amf_length as usize,
                instrument.amf_repeat as usize,
            )
            .0;
        }
        offset
    }

    /// Next index of a length/repeat table and whether a one-shot table ran out.
    ///
    /// Repeat 0 freezes on the last one-shot entry; otherwise the index loops
    /// within `[length, length + repeat)`.
    fn step_table(index: usize, length: usize, repeat: usize) -> (usize, bool) {
        let next = index + 1;
        let (next, exhausted) = if repeat == 0 {
            if next >= length {
                (length.saturating_sub(1), true)
            } else {
                (next, false)
            }
        } else if next >= length + repeat {
            (length, false)
        } else {
            (next, false)
        };
        (next.min(WAVE_TABLE_LENGTH - 1), exhausted)
    }

    /// Envelope volume and whether a one-shot envelope ended on zero
    fn adsr(&mut self, instrument: &Instrument, module: &Module) -> (u8, bool) {
        if !instrument.has_adsr() {
            return (self.volume, false);
        }
        let Some(table) = module.adsr_waves.get(instrument.adsr_wave as usize) else {
            return (self.volume, false);
        };

        let level = table.byte(self.adsr_index).min(MAX_VOLUME) as u32;
        let volume = (self.volume as u32 * level / MAX_VOLUME as u32).min(MAX_VOLUME as u32) as u8;

        let delay = if self.adsr_sustain {
            instrument.sustain_value
        } else {
            instrument.adsr_delay
        };
        let mut finished = false;
        if !(self.adsr_sustain && delay == 0) {
            self.adsr_counter += 1;
            if self.adsr_counter >= delay.max(1) {
                self.adsr_counter = 0;
                let (next, exhausted) = Self::step_table(
                    self.adsr_index,
                    instrument.adsr_length as usize,
                    instrument.adsr_repeat as usize,
                );
                self.adsr_index = next;
                finished = exhausted && table.byte(next) == 0;
                let sustain_point = instrument.sustain_point as usize;
                if sustain_point != 0 && self.adsr_index >= sustain_point {
                    self.adsr_sustain = true;
                }
            }
        }
        (volume, finished)
    }
}
