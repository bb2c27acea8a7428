//! Fixed-width record decoders shared by both dialects
//!
//! All values are big-endian. Record widths:
//! - Song: 12 bytes
//! - Voice: 4 bytes
//! - Note: 4 bytes
//! - Instrument: 152 bytes
//! - Wave table: 128 bytes

use crate::constants::WAVE_TABLE_LENGTH;
use crate::module::{Arpeggio, Instrument, Note, Sample, Song, Voice, WaveTable};
use crate::{Result, SonicError};
use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{be_i16, be_i8, be_u16, be_u32, be_u8};
use nom::IResult;

/// Size of one song record
pub const SONG_SIZE: usize = 12;
/// Size of one voice record
pub const VOICE_SIZE: usize = 4;
/// Size of one note record
pub const NOTE_SIZE: usize = 4;
/// Size of one instrument record
pub const INSTRUMENT_SIZE: usize = 152;
/// Size of one wave table
pub const WAVE_SIZE: usize = WAVE_TABLE_LENGTH;

const NAME_LENGTH: usize = 30;

/// Decode one song record
pub fn song(input: &[u8]) -> IResult<&[u8], Song> {
    let (input, speed) = be_u16(input)?;
    let (input, pattern_length) = be_u16(input)?;
    let (input, start_pos) = be_u16(input)?;
    let (input, stop_pos) = be_u16(input)?;
    let (input, repeat_pos) = be_u16(input)?;
    let (input, interrupts_per_second) = be_u16(input)?;
    Ok((
        input,
        Song {
            speed,
            pattern_length,
            start_pos,
            stop_pos,
            repeat_pos,
            interrupts_per_second,
        },
    ))
}

/// Decode one voice record
pub fn voice(input: &[u8]) -> IResult<&[u8], Voice> {
    let (input, note_address) = be_u16(input)?;
    let (input, note_transpose) = be_i8(input)?;
    let (input, instrument_transpose) = be_i8(input)?;
    Ok((
        input,
        Voice {
            note_address,
            note_transpose,
            instrument_transpose,
        },
    ))
}

/// Decode one note record
pub fn note(input: &[u8]) -> IResult<&[u8], Note> {
    let (input, pitch) = be_u8(input)?;
    let (input, instrument) = be_u8(input)?;
    let (input, control) = be_u8(input)?;
    let (input, param) = be_u8(input)?;
    Ok((input, Note::from_raw(pitch, instrument, control, param)))
}

fn arpeggio(input: &[u8]) -> IResult<&[u8], Arpeggio> {
    let (input, length) = be_u8(input)?;
    let (input, repeat) = be_u8(input)?;
    let (input, raw) = take(14usize)(input)?;
    let mut values = [0i8; 14];
    for (dst, &src) in values.iter_mut().zip(raw) {
        *dst = src as i8;
    }
    Ok((
        input,
        Arpeggio {
            length,
            repeat,
            values,
        },
    ))
}

/// Latin-1 name, cut at the first NUL
fn name(input: &[u8]) -> IResult<&[u8], String> {
    let (input, raw) = take(NAME_LENGTH)(input)?;
    let text = raw
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect::<String>();
    Ok((input, text.trim_end().to_string()))
}

/// Decode one instrument record
pub fn instrument(input: &[u8]) -> IResult<&[u8], Instrument> {
    let (input, synth) = be_u16(input)?;
    let (input, source_index) = be_u16(input)?;
    let (input, length) = be_u16(input)?;
    let (input, repeat) = be_u16(input)?;
    let (input, _) = take(8usize)(input)?;
    let (input, volume) = be_u16(input)?;
    let (input, fine_tuning) = be_i16(input)?;
    let (input, portamento) = be_u16(input)?;
    let (input, vib_delay) = be_u16(input)?;
    let (input, vib_speed) = be_u16(input)?;
    let (input, vib_level) = be_u16(input)?;
    let (input, amf_wave) = be_u16(input)?;
    let (input, amf_delay) = be_u16(input)?;
    let (input, amf_length) = be_u16(input)?;
    let (input, amf_repeat) = be_u16(input)?;
    let (input, adsr_wave) = be_u16(input)?;
    let (input, adsr_delay) = be_u16(input)?;
    let (input, adsr_length) = be_u16(input)?;
    let (input, adsr_repeat) = be_u16(input)?;
    let (input, sustain_point) = be_u16(input)?;
    let (input, sustain_value) = be_u16(input)?;
    let (input, _) = take(16usize)(input)?;
    let (input, effect) = be_u16(input)?;
    let (input, effect_arg1) = be_i16(input)?;
    let (input, effect_arg2) = be_i16(input)?;
    let (input, effect_arg3) = be_i16(input)?;
    let (input, effect_delay) = be_u16(input)?;
    let (input, arp0) = arpeggio(input)?;
    let (input, arp1) = arpeggio(input)?;
    let (input, arp2) = arpeggio(input)?;
    let (input, name) = name(input)?;

    Ok((
        input,
        Instrument {
            synth: synth != 0,
            source_index,
            length,
            repeat,
            volume,
            fine_tuning,
            portamento,
            vib_delay,
            vib_speed,
            vib_level,
            amf_wave,
            amf_delay,
            amf_length,
            amf_repeat,
            adsr_wave,
            adsr_delay,
            adsr_length,
            adsr_repeat,
            sustain_point,
            sustain_value,
            effect,
            effect_arg1,
            effect_arg2,
            effect_arg3,
            effect_delay,
            arpeggios: [arp0, arp1, arp2],
            name,
        },
    ))
}

/// Decode one 128-byte wave table
pub fn wave_table(input: &[u8]) -> IResult<&[u8], WaveTable> {
    let (input, raw) = take(WAVE_SIZE)(input)?;
    let mut table = [0u8; WAVE_TABLE_LENGTH];
    table.copy_from_slice(raw);
    Ok((input, WaveTable(table)))
}

/// Sample section body: `count u32`, `count` byte lengths, concatenated data
pub fn sample_bank(input: &[u8]) -> IResult<&[u8], Vec<Sample>> {
    let (input, n) = be_u32(input)?;
    let (mut input, lengths) = count(be_u32, n as usize)(input)?;
    let mut samples = Vec::with_capacity(lengths.len());
    for len in lengths {
        let (rest, raw) = take(len as usize)(input)?;
        samples.push(Sample(raw.iter().map(|&b| b as i8).collect()));
        input = rest;
    }
    Ok((input, samples))
}

/// Map a nom failure on `section` to a format error
pub fn section_error(section: &str) -> impl Fn(nom::Err<nom::error::Error<&[u8]>>) -> SonicError + '_ {
    move |err: nom::Err<nom::error::Error<&[u8]>>| match err {
        nom::Err::Incomplete(_) => SonicError::format(format!("{section}: truncated data")),
        nom::Err::Error(e) | nom::Err::Failure(e) => SonicError::format(format!(
            "{section}: malformed record ({:?}, {} bytes left)",
            e.code,
            e.input.len()
        )),
    }
}

/// Decode exactly `n` records of `parser` from the front of `data`.
///
/// Returns the records and the unconsumed remainder.
pub fn records<'a, T, P>(
    data: &'a [u8],
    n: usize,
    parser: P,
    section: &str,
) -> Result<(&'a [u8], Vec<T>)>
where
    P: FnMut(&'a [u8]) -> IResult<&'a [u8], T>,
{
    count(parser, n)(data).map_err(section_error(section))
}
