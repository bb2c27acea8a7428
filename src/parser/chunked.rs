//! Chunked (`SOAR`) dialect
//!
//! Layout:
//! - `"SOAR"` magic, `"V1.0"` version
//! - tagged sections `tag[4] count u32` followed by `count` records
//!
//! Sections: `STBL` songs, `OVTB` positions (4 voices each), `NTBL` notes,
//! `INST` instruments, `SD8B` samples, `SYWT`/`SYAR`/`SYAF` wave tables.
//! Parsing stops at the first unrecognised tag or at a clean end of data.

use super::records::{self, section_error};
use super::FormatParser;
use crate::constants::CHANNEL_COUNT;
use crate::module::{Dialect, Module};
use crate::{Result, SonicError};
use nom::number::complete::be_u32;

/// Container magic
pub const MAGIC: &[u8; 4] = b"SOAR";
/// Only version written by the editor
pub const VERSION: &[u8; 4] = b"V1.0";

/// Parser for the chunked dialect
pub struct ChunkedParser;

impl ChunkedParser {
    /// Whether `data` starts with the chunked magic
    pub fn matches(data: &[u8]) -> bool {
        data.len() >= 4 && &data[0..4] == MAGIC
    }

    fn section_count<'a>(data: &'a [u8], tag: &str) -> Result<(&'a [u8], usize)> {
        let (rest, n) = be_u32::<_, nom::error::Error<&[u8]>>(data).map_err(section_error(tag))?;
        Ok((rest, n as usize))
    }
}

impl FormatParser for ChunkedParser {
    fn parse(&self, data: &[u8]) -> Result<Module> {
        if !Self::matches(data) {
            return Err(SonicError::format("missing SOAR magic"));
        }
        if data.len() < 8 || &data[4..8] != VERSION {
            return Err(SonicError::format(format!(
                "unsupported SOAR version {:?}",
                data.get(4..8).map(String::from_utf8_lossy)
            )));
        }

        let mut module = Module::empty(Dialect::Chunked);
        let mut input = &data[8..];

        while input.len() >= 4 {
            let tag = &input[0..4];
            let tag_name = String::from_utf8_lossy(tag).into_owned();
            let body = &input[4..];

            input = match tag {
                b"STBL" => {
                    let (rest, n) = Self::section_count(body, &tag_name)?;
                    let (rest, songs) = records::records(rest, n, records::song, &tag_name)?;
                    module.songs = songs;
                    rest
                }
                b"OVTB" => {
                    let (rest, n) = Self::section_count(body, &tag_name)?;
                    let total = n.checked_mul(CHANNEL_COUNT).ok_or_else(|| {
                        SonicError::format(format!("OVTB: position count {n} overflows"))
                    })?;
                    let (rest, voices) = records::records(rest, total, records::voice, &tag_name)?;
                    module.voices = voices;
                    rest
                }
                b"NTBL" => {
                    let (rest, n) = Self::section_count(body, &tag_name)?;
                    let (rest, notes) = records::records(rest, n, records::note, &tag_name)?;
                    module.notes = notes;
                    rest
                }
                b"INST" => {
                    let (rest, n) = Self::section_count(body, &tag_name)?;
                    let (rest, instruments) =
                        records::records(rest, n, records::instrument, &tag_name)?;
                    module.instruments = instruments;
                    rest
                }
                b"SD8B" => {
                    let (rest, samples) =
                        records::sample_bank(body).map_err(section_error(&tag_name))?;
                    module.samples = samples;
                    rest
                }
                b"SYWT" | b"SYAR" | b"SYAF" => {
                    let (rest, n) = Self::section_count(body, &tag_name)?;
                    let (rest, waves) = records::records(rest, n, records::wave_table, &tag_name)?;
                    match tag {
                        b"SYWT" => module.waves = waves,
                        b"SYAR" => module.adsr_waves = waves,
                        _ => module.amf_waves = waves,
                    }
                    rest
                }
                _ => {
                    tracing::debug!(tag = %tag_name, "stopping at unrecognised section");
                    break;
                }
            };
        }

        tracing::debug!(
            songs = module.songs.len(),
            voices = module.voices.len(),
            notes = module.notes.len(),
            instruments = module.instruments.len(),
            samples = module.samples.len(),
            waves = module.waves.len(),
            "parsed chunked module"
        );
        Ok(module)
    }

    fn name(&self) -> &str {
        "Sonic Arranger (SOAR)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.extend_from_slice(VERSION);
        raw
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = ChunkedParser.parse(b"SOAPV1.0").unwrap_err();
        assert!(matches!(err, SonicError::Format(_)));
    }

    #[test]
    fn test_rejects_bad_version() {
        let err = ChunkedParser.parse(b"SOARV2.0").unwrap_err();
        assert!(matches!(err, SonicError::Format(_)));
    }

    #[test]
    fn test_empty_module() {
        let module = ChunkedParser.parse(&header()).unwrap();
        assert_eq!(module.dialect, Dialect::Chunked);
        assert!(module.songs.is_empty());
    }

    #[test]
    fn test_stops_at_unknown_tag() {
        let mut raw = header();
        raw.extend_from_slice(b"STBL");
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(&[0, 6, 0, 4, 0, 0, 0, 0, 0, 0, 0, 50]);
        raw.extend_from_slice(b"XXXX garbage follows");
        let module = ChunkedParser.parse(&raw).unwrap();
        assert_eq!(module.songs.len(), 1);
        assert_eq!(module.songs[0].speed, 6);
    }

    #[test]
    fn test_positions_hold_four_voices() {
        let mut raw = header();
        raw.extend_from_slice(b"OVTB");
        raw.extend_from_slice(&2u32.to_be_bytes());
        for i in 0..8u16 {
            raw.extend_from_slice(&(i * 4).to_be_bytes());
            raw.extend_from_slice(&[0, 0]);
        }
        let module = ChunkedParser.parse(&raw).unwrap();
        assert_eq!(module.voices.len(), 8);
        assert_eq!(module.position_count(), 2);
        assert_eq!(module.voices[7].note_address, 28);
    }

    #[test]
    fn test_truncated_section_fails() {
        let mut raw = header();
        raw.extend_from_slice(b"NTBL");
        raw.extend_from_slice(&4u32.to_be_bytes());
        raw.extend_from_slice(&[1, 2, 3, 4, 5]);
        let err = ChunkedParser.parse(&raw).unwrap_err();
        assert!(matches!(err, SonicError::Format(_)));
    }
}
