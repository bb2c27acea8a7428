//! Fixture writer: serialise a `Module` in either container dialect

#![allow(dead_code)]

use sonic_arranger::module::Arpeggio;
use sonic_arranger::{Dialect, Instrument, Module, Note, Sample, Song, Voice, WaveTable};

pub const LEGACY_HEADER: usize = 0x28;

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn songs(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    for s in &module.songs {
        for v in [
            s.speed,
            s.pattern_length,
            s.start_pos,
            s.stop_pos,
            s.repeat_pos,
            s.interrupts_per_second,
        ] {
            put_u16(&mut out, v);
        }
    }
    out
}

fn voices(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    for v in &module.voices {
        put_u16(&mut out, v.note_address);
        out.push(v.note_transpose as u8);
        out.push(v.instrument_transpose as u8);
    }
    out
}

fn notes(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    for n in &module.notes {
        out.extend_from_slice(&[n.pitch, n.instrument, n.control(), n.param]);
    }
    out
}

fn arpeggio(out: &mut Vec<u8>, arp: &Arpeggio) {
    out.push(arp.length);
    out.push(arp.repeat);
    out.extend(arp.values.iter().map(|&v| v as u8));
}

fn instruments(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    for i in &module.instruments {
        let start = out.len();
        put_u16(&mut out, i.synth as u16);
        put_u16(&mut out, i.source_index);
        put_u16(&mut out, i.length);
        put_u16(&mut out, i.repeat);
        out.extend_from_slice(&[0; 8]);
        put_u16(&mut out, i.volume);
        put_i16(&mut out, i.fine_tuning);
        for v in [
            i.portamento,
            i.vib_delay,
            i.vib_speed,
            i.vib_level,
            i.amf_wave,
            i.amf_delay,
            i.amf_length,
            i.amf_repeat,
            i.adsr_wave,
            i.adsr_delay,
            i.adsr_length,
            i.adsr_repeat,
            i.sustain_point,
            i.sustain_value,
        ] {
            put_u16(&mut out, v);
        }
        out.extend_from_slice(&[0; 16]);
        put_u16(&mut out, i.effect);
        put_i16(&mut out, i.effect_arg1);
        put_i16(&mut out, i.effect_arg2);
        put_i16(&mut out, i.effect_arg3);
        put_u16(&mut out, i.effect_delay);
        for arp in &i.arpeggios {
            arpeggio(&mut out, arp);
        }
        let mut name = [0u8; 30];
        for (dst, b) in name.iter_mut().zip(i.name.bytes()) {
            *dst = b;
        }
        out.extend_from_slice(&name);
        assert_eq!(out.len() - start, 152);
    }
    out
}

fn waves(tables: &[WaveTable]) -> Vec<u8> {
    tables.iter().flat_map(|t| t.0).collect()
}

fn sample_bank(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, module.samples.len() as u32);
    for s in &module.samples {
        put_u32(&mut out, s.len() as u32);
    }
    for s in &module.samples {
        out.extend(s.data().iter().map(|&b| b as u8));
    }
    out
}

/// `SOAR` container
pub fn chunked(module: &Module) -> Vec<u8> {
    let mut out = b"SOAR".to_vec();
    out.extend_from_slice(b"V1.0");

    let mut section = |tag: &[u8; 4], count: usize, body: Vec<u8>| {
        out.extend_from_slice(tag);
        put_u32(&mut out, count as u32);
        out.extend(body);
    };
    section(b"STBL", module.songs.len(), songs(module));
    section(b"OVTB", module.voices.len() / 4, voices(module));
    section(b"NTBL", module.notes.len(), notes(module));
    section(b"INST", module.instruments.len(), instruments(module));
    section(b"SYWT", module.waves.len(), waves(&module.waves));
    section(b"SYAR", module.adsr_waves.len(), waves(&module.adsr_waves));
    section(b"SYAF", module.amf_waves.len(), waves(&module.amf_waves));

    out.extend_from_slice(b"SD8B");
    out.extend(sample_bank(module));
    out
}

/// Legacy pointer-table layout, header placed after `prefix` bytes of replay code
pub fn legacy(module: &Module, prefix: usize, author: &str) -> Vec<u8> {
    let sections = [
        songs(module),
        voices(module),
        notes(module),
        instruments(module),
        waves(&module.waves),
        waves(&module.adsr_waves),
        waves(&module.amf_waves),
    ];

    let mut fields = [0u32; 10];
    let mut offset = LEGACY_HEADER as u32;
    for (field, body) in fields.iter_mut().zip(&sections) {
        *field = offset;
        offset += body.len() as u32;
    }
    fields[7] = offset;

    // Looks like 68000 code: never a 0x00000028 long word
    let mut out: Vec<u8> = (0..prefix).map(|i| 0x4E + (i % 3) as u8).collect();
    for f in fields {
        put_u32(&mut out, f);
    }
    for body in sections {
        out.extend(body);
    }
    out.extend(sample_bank(module));
    out.extend_from_slice(b"AUTH\0\0\0\0");
    out.extend(author.bytes().map(|b| !b));
    out.push(0xFF);
    out
}

/// The reference scenario: one sampled note on channel 0 of a 4-step pattern
pub fn single_note_module() -> Module {
    let mut module = Module::empty(Dialect::Chunked);
    module.songs.push(Song {
        speed: 6,
        pattern_length: 4,
        start_pos: 0,
        stop_pos: 0,
        repeat_pos: 0,
        interrupts_per_second: 50,
    });
    module.voices = vec![
        Voice::default(),
        Voice {
            note_address: 4,
            ..Default::default()
        },
        Voice {
            note_address: 4,
            ..Default::default()
        },
        Voice {
            note_address: 4,
            ..Default::default()
        },
    ];
    module.notes = vec![Note::default(); 8];
    module.notes[0] = Note::from_raw(49, 1, 0, 0);
    module.instruments.push(Instrument {
        synth: false,
        source_index: 0,
        length: 2,
        volume: 64,
        name: "blip".into(),
        ..Default::default()
    });
    module.samples.push(Sample(vec![64, 32, -32, -64]));
    module
}

fn ramp() -> WaveTable {
    let mut t = [0u8; 128];
    for (i, b) in t.iter_mut().enumerate() {
        *b = (i as i8 - 64) as u8;
    }
    WaveTable(t)
}

fn square() -> WaveTable {
    let mut t = [0u8; 128];
    for (i, b) in t.iter_mut().enumerate() {
        *b = if i < 64 { 0x60 } else { 0xA0 };
    }
    WaveTable(t)
}

fn envelope() -> WaveTable {
    let mut t = [0u8; 128];
    for (i, b) in t.iter_mut().enumerate().take(16) {
        *b = 64 - (i as u8) * 4;
    }
    WaveTable(t)
}

/// Two songs, two positions, transposes, synth and sampled instruments
pub fn rich_module() -> Module {
    let mut module = Module::empty(Dialect::Chunked);
    module.songs = vec![
        Song {
            speed: 4,
            pattern_length: 4,
            start_pos: 0,
            stop_pos: 1,
            repeat_pos: 0,
            interrupts_per_second: 50,
        },
        Song {
            speed: 3,
            pattern_length: 4,
            start_pos: 1,
            stop_pos: 1,
            repeat_pos: 1,
            interrupts_per_second: 100,
        },
    ];

    // Patterns: 0 = melody, 1 = bass, 2 = effects, 3 = rest
    let melody = [
        Note::from_raw(49, 1, 0, 0),
        Note::from_raw(NOTE_HOLD, 0, 0x0C, 40),
        Note::from_raw(53, 0, 0, 0),
        Note::from_raw(0x7f, 0, 0, 0),
    ];
    let bass = [
        Note::from_raw(25, 2, 0x40, 0),
        Note::default(),
        Note::from_raw(0, 2, 0x80, 0),
        Note::from_raw(0x80, 0, 0x0E, 1),
    ];
    let effects = [
        Note::from_raw(61, 3, 0x02, 2),
        Note::from_raw(0, 0, 0x07, 5),
        Note::from_raw(0, 0, 0x08, 0),
        Note::from_raw(0, 0, 0x0F, 4),
    ];
    module.notes.extend_from_slice(&melody);
    module.notes.extend_from_slice(&bass);
    module.notes.extend_from_slice(&effects);
    module.notes.extend(std::iter::repeat(Note::default()).take(4));

    let v = |note_address: u16, note_transpose: i8, instrument_transpose: i8| Voice {
        note_address,
        note_transpose,
        instrument_transpose,
    };
    module.voices = vec![
        v(0, 0, 0),
        v(4, 0, 0),
        v(8, 0, 0),
        v(12, 0, 0),
        v(0, 12, 0),
        v(4, -12, 1),
        v(8, 0, 0),
        v(12, 0, 0),
    ];

    let mut arpeggios = [Arpeggio::default(); 3];
    arpeggios[1] = Arpeggio {
        length: 3,
        repeat: 0,
        values: [0, 4, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, -12],
    };
    module.instruments = vec![
        Instrument {
            synth: true,
            source_index: 0,
            length: 32,
            volume: 48,
            vib_delay: 2,
            vib_speed: 8,
            vib_level: 16,
            effect: 3,
            effect_arg1: 1,
            effect_arg2: 0,
            effect_arg3: 63,
            effect_delay: 2,
            arpeggios,
            name: "lead".into(),
            ..Default::default()
        },
        Instrument {
            synth: false,
            source_index: 0,
            length: 8,
            repeat: 4,
            volume: 64,
            fine_tuning: -2,
            adsr_wave: 0,
            adsr_delay: 1,
            adsr_length: 16,
            name: "bass".into(),
            ..Default::default()
        },
        Instrument {
            synth: true,
            source_index: 1,
            length: 64,
            volume: 40,
            amf_wave: 0,
            amf_delay: 1,
            amf_length: 4,
            amf_repeat: 4,
            effect: 7,
            effect_arg1: 0,
            effect_arg2: 0,
            effect_arg3: 127,
            name: "shack".into(),
            ..Default::default()
        },
    ];

    module.waves = vec![square(), ramp()];
    module.adsr_waves = vec![envelope()];
    let mut amf = [0u8; 128];
    amf[..8].copy_from_slice(&[0, 2, 4, 2, 0, 0xFE, 0xFC, 0xFE]);
    module.amf_waves = vec![WaveTable(amf)];
    module.samples = vec![
        Sample((0..24).map(|i| if i % 4 < 2 { 90 } else { -90 }).collect()),
        Sample(vec![1, 2, 3]),
    ];
    module
}

const NOTE_HOLD: u8 = 0;
