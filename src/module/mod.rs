//! Parsed Module Data Model
//!
//! Immutable tables produced by the parsers. Nothing in here changes after
//! parsing; runtime state lives in the replayer.

pub mod effects;

pub use effects::{EffectKind, InstrumentEffect, WaveRange};

use crate::constants::WAVE_TABLE_LENGTH;
use bitflags::bitflags;
use serde::Serialize;

/// Container dialect a module was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dialect {
    /// `SOAR` magic followed by tagged sections
    Chunked,
    /// Replayer-embedded pointer table located by scanning
    Legacy,
}

/// One sub-song: timing and pattern order bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Song {
    /// Interrupts per pattern step (0 pauses the step clock)
    pub speed: u16,
    /// Steps per pattern
    pub pattern_length: u16,
    /// First pattern position played
    pub start_pos: u16,
    /// Last pattern position played (inclusive)
    pub stop_pos: u16,
    /// Position to jump back to when looping
    pub repeat_pos: u16,
    /// Rate of the fast effect clock
    pub interrupts_per_second: u16,
}

/// Pattern reference for one track of one position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Voice {
    /// Index into the note table of this pattern's first step
    pub note_address: u16,
    /// Semitones added to every pitch of the pattern
    pub note_transpose: i8,
    /// Offset added to every instrument number of the pattern
    pub instrument_transpose: i8,
}

bitflags! {
    /// Transpose suppression bits of a note's control byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NoteFlags: u8 {
        /// Ignore the voice's instrument transpose
        const DISABLE_INSTRUMENT_TRANSPOSE = 0x80;
        /// Ignore the voice's note transpose
        const DISABLE_NOTE_TRANSPOSE = 0x40;
    }
}

/// One step of one track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Note {
    /// 0 = hold, 0x7f = note off, 0x80 = reserved, 1..=108 = pitch
    pub pitch: u8,
    /// 1-based instrument number (0 = none)
    pub instrument: u8,
    /// Transpose suppression
    pub flags: NoteFlags,
    /// Legacy arpeggio table selector (0..=3), carried but not played
    pub arpeggio: u8,
    /// Command code (low nibble of the control byte)
    pub command: u8,
    /// Command parameter
    pub param: u8,
}

impl Note {
    /// Build a note from its four raw bytes
    pub fn from_raw(pitch: u8, instrument: u8, control: u8, param: u8) -> Self {
        Note {
            pitch,
            instrument,
            flags: NoteFlags::from_bits_truncate(control),
            arpeggio: (control >> 4) & 0x03,
            command: control & 0x0f,
            param,
        }
    }

    /// Reassemble the raw control byte
    pub fn control(&self) -> u8 {
        self.flags.bits() | (self.arpeggio << 4) | self.command
    }
}

/// Legacy arpeggio table stored with each instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Arpeggio {
    /// Entries used
    pub length: u8,
    /// Loop length
    pub repeat: u8,
    /// Semitone offsets
    pub values: [i8; 14],
}

/// Instrument definition (152 bytes on disk)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Instrument {
    /// Source is a synth wave table instead of a sample
    pub synth: bool,
    /// Index into the sample or synth wave table
    pub source_index: u16,
    /// One-shot part in words
    pub length: u16,
    /// Loop part in words (values of 0 and 1 mean no loop)
    pub repeat: u16,
    /// Base volume 0..=64
    pub volume: u16,
    /// Signed period drift applied each interrupt
    pub fine_tuning: i16,
    /// Portamento speed (stored only)
    pub portamento: u16,
    /// Interrupts between vibrato table reads
    pub vib_delay: u16,
    /// Vibrato table step
    pub vib_speed: u16,
    /// Vibrato divisor (0 disables vibrato)
    pub vib_level: u16,
    /// AMF table index
    pub amf_wave: u16,
    /// Interrupts between AMF steps
    pub amf_delay: u16,
    /// One-shot AMF entries
    pub amf_length: u16,
    /// Looping AMF entries
    pub amf_repeat: u16,
    /// ADSR table index
    pub adsr_wave: u16,
    /// Interrupts between ADSR steps
    pub adsr_delay: u16,
    /// One-shot ADSR entries
    pub adsr_length: u16,
    /// Looping ADSR entries
    pub adsr_repeat: u16,
    /// ADSR index where sustain begins (0 = none)
    pub sustain_point: u16,
    /// Interrupts between ADSR steps while sustaining (0 = hold)
    pub sustain_value: u16,
    /// Raw effect number (see [`EffectKind`])
    pub effect: u16,
    /// First effect argument
    pub effect_arg1: i16,
    /// Second effect argument
    pub effect_arg2: i16,
    /// Third effect argument
    pub effect_arg3: i16,
    /// Interrupts between effect runs
    pub effect_delay: u16,
    /// Legacy arpeggio tables
    pub arpeggios: [Arpeggio; 3],
    /// Display name
    pub name: String,
}

impl Instrument {
    /// Whether an ADSR envelope drives the volume
    pub fn has_adsr(&self) -> bool {
        self.adsr_length as u32 + self.adsr_repeat as u32 != 0
    }

    /// Whether an AMF table bends the period
    pub fn has_amf(&self) -> bool {
        self.amf_length as u32 + self.amf_repeat as u32 != 0
    }
}

/// 128 raw bytes: a synth waveform, an ADSR envelope or AMF offsets
#[derive(Clone, PartialEq, Eq)]
pub struct WaveTable(pub [u8; WAVE_TABLE_LENGTH]);

impl WaveTable {
    /// Byte at `index` (wrapped into the table)
    #[inline]
    pub fn byte(&self, index: usize) -> u8 {
        self.0[index % WAVE_TABLE_LENGTH]
    }

    /// Byte at `index` read as a signed sample
    #[inline]
    pub fn signed(&self, index: usize) -> i8 {
        self.byte(index) as i8
    }

    /// Whole table as signed PCM
    pub fn to_signed(&self) -> Vec<i8> {
        self.0.iter().map(|&b| b as i8).collect()
    }
}

impl std::fmt::Debug for WaveTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WaveTable({:02x?}..)", &self.0[..8])
    }
}

impl Default for WaveTable {
    fn default() -> Self {
        WaveTable([0; WAVE_TABLE_LENGTH])
    }
}

/// Raw signed 8-bit PCM sample
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sample(pub Vec<i8>);

impl Sample {
    /// Sample bytes
    pub fn data(&self) -> &[i8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sample holds no data
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A fully decoded module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Sub-songs
    pub songs: Vec<Song>,
    /// Pattern references, four per position
    pub voices: Vec<Voice>,
    /// Note table shared by all patterns
    pub notes: Vec<Note>,
    /// Instruments, addressed 1-based by notes
    pub instruments: Vec<Instrument>,
    /// Synth waveforms
    pub waves: Vec<WaveTable>,
    /// ADSR volume envelopes
    pub adsr_waves: Vec<WaveTable>,
    /// AMF period offset tables
    pub amf_waves: Vec<WaveTable>,
    /// Sampled instruments
    pub samples: Vec<Sample>,
    /// Container the module came from
    pub dialect: Dialect,
    /// Author string (legacy dialect only)
    pub author: Option<String>,
}

impl Module {
    /// Create an empty module of the given dialect
    pub fn empty(dialect: Dialect) -> Self {
        Module {
            songs: Vec::new(),
            voices: Vec::new(),
            notes: Vec::new(),
            instruments: Vec::new(),
            waves: Vec::new(),
            adsr_waves: Vec::new(),
            amf_waves: Vec::new(),
            samples: Vec::new(),
            dialect,
            author: None,
        }
    }

    /// Instrument for a 1-based note instrument number
    pub fn instrument(&self, number: usize) -> Option<&Instrument> {
        number.checked_sub(1).and_then(|i| self.instruments.get(i))
    }

    /// Number of pattern positions described by the voice table
    pub fn position_count(&self) -> usize {
        self.voices.len() / crate::constants::CHANNEL_COUNT
    }

    /// Serializable summary of this module
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            dialect: self.dialect,
            author: self.author.clone(),
            songs: self.songs.clone(),
            positions: self.position_count(),
            notes: self.notes.len(),
            instruments: self
                .instruments
                .iter()
                .enumerate()
                .map(|(i, inst)| InstrumentSummary {
                    number: i + 1,
                    name: inst.name.clone(),
                    synth: inst.synth,
                    volume: inst.volume,
                    effect: EffectKind::from_raw(inst.effect)
                        .map(|kind| format!("{kind:?}"))
                        .unwrap_or_else(|| format!("unknown({})", inst.effect)),
                })
                .collect(),
            waves: self.waves.len(),
            adsr_waves: self.adsr_waves.len(),
            amf_waves: self.amf_waves.len(),
            samples: self.samples.iter().map(Sample::len).collect(),
        }
    }
}

/// Per-instrument line of a [`ModuleInfo`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentSummary {
    /// 1-based instrument number as used by notes
    pub number: usize,
    /// Display name
    pub name: String,
    /// Synth wave source
    pub synth: bool,
    /// Base volume
    pub volume: u16,
    /// Effect name
    pub effect: String,
}

/// Module summary for display or JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Container dialect
    pub dialect: Dialect,
    /// Author (legacy dialect only)
    pub author: Option<String>,
    /// Sub-songs
    pub songs: Vec<Song>,
    /// Pattern positions
    pub positions: usize,
    /// Note table entries
    pub notes: usize,
    /// Instruments
    pub instruments: Vec<InstrumentSummary>,
    /// Synth waves
    pub waves: usize,
    /// ADSR tables
    pub adsr_waves: usize,
    /// AMF tables
    pub amf_waves: usize,
    /// Sample lengths in bytes
    pub samples: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_control_byte_split() {
        let note = Note::from_raw(49, 1, 0xC0 | 0x20 | 0x0F, 3);
        assert!(note.flags.contains(NoteFlags::DISABLE_INSTRUMENT_TRANSPOSE));
        assert!(note.flags.contains(NoteFlags::DISABLE_NOTE_TRANSPOSE));
        assert_eq!(note.arpeggio, 2);
        assert_eq!(note.command, 0x0F);
        assert_eq!(note.control(), 0xEF);
    }

    #[test]
    fn test_instrument_lookup_is_one_based() {
        let mut module = Module::empty(Dialect::Chunked);
        module.instruments.push(Instrument {
            name: "bass".into(),
            ..Default::default()
        });
        assert!(module.instrument(0).is_none());
        assert_eq!(module.instrument(1).map(|i| i.name.as_str()), Some("bass"));
        assert!(module.instrument(2).is_none());
    }

    #[test]
    fn test_info_serializes() {
        let mut module = Module::empty(Dialect::Legacy);
        module.author = Some("someone".into());
        module.songs.push(Song {
            speed: 6,
            pattern_length: 64,
            interrupts_per_second: 50,
            ..Default::default()
        });
        let json = serde_json::to_string(&module.info()).unwrap();
        assert!(json.contains("\"dialect\":\"Legacy\""));
        assert!(json.contains("\"author\":\"someone\""));
        assert!(json.contains("\"pattern_length\":64"));
    }
}
