//! Legacy pointer-table dialect
//!
//! Modules saved together with their replay routine carry no magic. The
//! tables are located through a 0x28-byte header of ten `u32` offsets,
//! relative to the header itself:
//!
//! | field | section          | record width |
//! |-------|------------------|--------------|
//! | 0     | songs            | 12           |
//! | 1     | voices           | 4            |
//! | 2     | notes            | 4            |
//! | 3     | instruments      | 152          |
//! | 4     | synth waves      | 128          |
//! | 5     | ADSR waves       | 128          |
//! | 6     | AMF waves        | 128          |
//! | 7     | samples          | `SD8B` body  |
//! | 8, 9  | reserved         |              |
//!
//! Songs always follow the header, so field 0 holds 0x28 and serves as the
//! scan marker. After the samples come an 8-byte `AUTH` sentinel and the
//! bit-inverted author string.

use super::records::{self, section_error};
use super::FormatParser;
use crate::constants::CHANNEL_COUNT;
use crate::module::{Dialect, Module};
use crate::{Result, SonicError};
use nom::IResult;

/// Header size and value of the marker field
pub const HEADER_SIZE: usize = 0x28;
/// Sentinel preceding the author string
pub const AUTHOR_SENTINEL: &[u8; 8] = b"AUTH\0\0\0\0";

const SECTION_FIELDS: usize = 8;

/// Parser for the legacy pointer-table dialect
pub struct LegacyParser;

impl LegacyParser {
    fn read_header(data: &[u8], at: usize) -> Option<[u32; 10]> {
        let raw = data.get(at..at + HEADER_SIZE)?;
        let mut fields = [0u32; 10];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = u32::from_be_bytes([raw[i * 4], raw[i * 4 + 1], raw[i * 4 + 2], raw[i * 4 + 3]]);
        }
        Some(fields)
    }

    /// Find the header start: first word-aligned position whose marker field
    /// is 0x28 and whose section offsets are ordered and inside the data.
    pub fn locate(data: &[u8]) -> Option<(usize, [u32; 10])> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        (0..=data.len() - HEADER_SIZE).step_by(2).find_map(|at| {
            let fields = Self::read_header(data, at)?;
            if fields[0] as usize != HEADER_SIZE {
                return None;
            }
            let ordered = fields[..SECTION_FIELDS].windows(2).all(|w| w[0] <= w[1]);
            let inside = at + fields[SECTION_FIELDS - 1] as usize <= data.len();
            (ordered && inside).then_some((at, fields))
        })
    }

    /// Number of `width`-byte records between two offsets
    fn entry_count(name: &str, from: u32, to: u32, width: usize) -> Result<usize> {
        let bytes = (to - from) as usize;
        if bytes % width != 0 {
            return Err(SonicError::format(format!(
                "{name} section is {bytes} bytes, not a multiple of {width}"
            )));
        }
        Ok(bytes / width)
    }

    fn author(input: &[u8]) -> IResult<&[u8], String> {
        let (input, _) = nom::bytes::complete::tag(&AUTHOR_SENTINEL[..])(input)?;
        let (input, raw) = nom::bytes::complete::take_till(|b: u8| !b == 0)(input)?;
        let (input, _) = nom::bytes::complete::take(1usize)(input)?;
        Ok((input, raw.iter().map(|&b| (!b) as char).collect()))
    }
}

impl FormatParser for LegacyParser {
    fn parse(&self, data: &[u8]) -> Result<Module> {
        let (base, fields) = Self::locate(data)
            .ok_or_else(|| SonicError::format("no Sonic Arranger header found"))?;
        tracing::debug!(offset = base, "located legacy header");

        let section =
            move |index: usize| &data[base + fields[index] as usize..base + fields[index + 1] as usize];

        let mut module = Module::empty(Dialect::Legacy);

        let n = Self::entry_count("song", fields[0], fields[1], records::SONG_SIZE)?;
        module.songs = records::records(section(0), n, records::song, "songs")?.1;

        let n = Self::entry_count("voice", fields[1], fields[2], records::VOICE_SIZE)?;
        if n % CHANNEL_COUNT != 0 {
            return Err(SonicError::format(format!(
                "voice table holds {n} entries, not whole positions"
            )));
        }
        module.voices = records::records(section(1), n, records::voice, "voices")?.1;

        let n = Self::entry_count("note", fields[2], fields[3], records::NOTE_SIZE)?;
        module.notes = records::records(section(2), n, records::note, "notes")?.1;

        let n = Self::entry_count("instrument", fields[3], fields[4], records::INSTRUMENT_SIZE)?;
        module.instruments =
            records::records(section(3), n, records::instrument, "instruments")?.1;

        let n = Self::entry_count("wave", fields[4], fields[5], records::WAVE_SIZE)?;
        module.waves = records::records(section(4), n, records::wave_table, "waves")?.1;

        let n = Self::entry_count("ADSR", fields[5], fields[6], records::WAVE_SIZE)?;
        module.adsr_waves = records::records(section(5), n, records::wave_table, "ADSR")?.1;

        let n = Self::entry_count("AMF", fields[6], fields[7], records::WAVE_SIZE)?;
        module.amf_waves = records::records(section(6), n, records::wave_table, "AMF")?.1;

        let tail = &data[base + fields[7] as usize..];
        let (tail, samples) = records::sample_bank(tail).map_err(section_error("samples"))?;
        module.samples = samples;

        let (_, author) = Self::author(tail).map_err(section_error("author"))?;
        module.author = Some(author);

        tracing::debug!(
            songs = module.songs.len(),
            voices = module.voices.len(),
            notes = module.notes.len(),
            instruments = module.instruments.len(),
            samples = module.samples.len(),
            waves = module.waves.len(),
            "parsed legacy module"
        );
        Ok(module)
    }

    fn name(&self) -> &str {
        "Sonic Arranger (legacy)"
    }
}
