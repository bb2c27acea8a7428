//! Paula Hardware Constants
//!
//! Shared clocks, limits and lookup tables used by the channel emulation and
//! the per-channel note/effect compiler.

/// PAL Amiga master clock in Hz (Paula resamples at `clock / (2 * period)`)
pub const PAL_CLOCK_HZ: f64 = 7_093_789.2;

/// NTSC Amiga master clock in Hz
pub const NTSC_CLOCK_HZ: f64 = 7_159_090.5;

/// Corner frequency of the A500 "LED" output filter (2-pole low-pass)
pub const LED_FILTER_CUTOFF_HZ: f32 = 3_275.0;

/// Number of hardware voices
pub const CHANNEL_COUNT: usize = 4;

/// Maximum channel or envelope volume
pub const MAX_VOLUME: u8 = 64;

/// Smallest period pushed to Paula; anything lower would run away in pitch
pub const MIN_PERIOD: u16 = 124;

/// Every wave table (synth wave, ADSR, AMF) holds exactly this many bytes
pub const WAVE_TABLE_LENGTH: usize = 128;

/// Note value meaning "release the note"
pub const NOTE_OFF: u8 = 0x7f;

/// Reserved note value that does nothing
pub const NOTE_RESERVED: u8 = 0x80;

/// Highest playable pitch value (9 octaves of 12 semitones)
pub const MAX_PITCH: u8 = 108;

/// Volume removed per interrupt while a channel fades out
pub const FADE_OUT_STEP: u8 = 4;

/// Fine tuning moves this much toward zero every interrupt
pub const FINETUNE_DECAY: i32 = 1;

/// Highest pattern-step speed a note command may select
pub const MAX_SPEED: u16 = 16;

/// Supported output sample rates (inclusive)
pub const MIN_SAMPLE_RATE: u32 = 2_000;
/// Supported output sample rates (inclusive)
pub const MAX_SAMPLE_RATE: u32 = 200_000;

/// Supported song interrupt rates (inclusive)
pub const MIN_INTERRUPTS_PER_SECOND: u16 = 1;
/// Supported song interrupt rates (inclusive)
pub const MAX_INTERRUPTS_PER_SECOND: u16 = 200;

/// Largest chunk a single `read` call may request
pub const MAX_READ_MILLIS: u32 = 1_000;

/// Pitch value (1..=108) to Paula period.
///
/// Octave 3, pitch class 0 (pitch value 49) is the 856 reference period.
pub const PERIOD_TABLE: [u16; MAX_PITCH as usize] = [
    13696, 12928, 12192, 11520, 10848, 10240, 9664, 9120, 8608, 8128, 7680, 7248, //
    6848, 6464, 6096, 5760, 5424, 5120, 4832, 4560, 4304, 4064, 3840, 3624, //
    3424, 3232, 3048, 2880, 2712, 2560, 2416, 2280, 2152, 2032, 1920, 1812, //
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 906, //
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, //
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, //
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, //
    107, 101, 95, 90, 85, 80, 75, 71, 67, 63, 60, 56, //
    53, 50, 47, 45, 42, 40, 37, 35, 33, 31, 30, 28, //
];

/// One sine cycle used by the vibrato, indexed modulo 256
pub const VIBRATO_TABLE: [i8; 256] = [
    0, 3, 6, 9, 12, 16, 19, 22, 25, 28, 31, 34, 37, 40, 43, 46, //
    49, 51, 54, 57, 60, 63, 65, 68, 71, 73, 76, 78, 81, 83, 85, 88, //
    90, 92, 94, 96, 98, 100, 102, 104, 106, 107, 109, 111, 112, 113, 115, 116, //
    117, 118, 120, 121, 122, 122, 123, 124, 125, 125, 126, 126, 126, 127, 127, 127, //
    127, 127, 127, 127, 126, 126, 126, 125, 125, 124, 123, 122, 122, 121, 120, 118, //
    117, 116, 115, 113, 112, 111, 109, 107, 106, 104, 102, 100, 98, 96, 94, 92, //
    90, 88, 85, 83, 81, 78, 76, 73, 71, 68, 65, 63, 60, 57, 54, 51, //
    49, 46, 43, 40, 37, 34, 31, 28, 25, 22, 19, 16, 12, 9, 6, 3, //
    0, -3, -6, -9, -12, -16, -19, -22, -25, -28, -31, -34, -37, -40, -43, -46, //
    -49, -51, -54, -57, -60, -63, -65, -68, -71, -73, -76, -78, -81, -83, -85, -88, //
    -90, -92, -94, -96, -98, -100, -102, -104, -106, -107, -109, -111, -112, -113, -115, -116, //
    -117, -118, -120, -121, -122, -122, -123, -124, -125, -125, -126, -126, -126, -127, -127, -127, //
    -127, -127, -127, -127, -126, -126, -126, -125, -125, -124, -123, -122, -122, -121, -120, -118, //
    -117, -116, -115, -113, -112, -111, -109, -107, -106, -104, -102, -100, -98, -96, -94, -92, //
    -90, -88, -85, -83, -81, -78, -76, -73, -71, -68, -65, -63, -60, -57, -54, -51, //
    -49, -46, -43, -40, -37, -34, -31, -28, -25, -22, -19, -16, -12, -9, -6, -3, //
];

/// Look up the Paula period for a pitch value in `1..=108`.
///
/// Returns `None` for 0 (hold) and anything above the table.
#[inline]
pub fn period_for_pitch(pitch: u8) -> Option<u16> {
    if pitch == 0 {
        return None;
    }
    PERIOD_TABLE.get(pitch as usize - 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitch_period() {
        assert_eq!(period_for_pitch(49), Some(856));
        assert_eq!(period_for_pitch(1), Some(13696));
        assert_eq!(period_for_pitch(108), Some(28));
    }

    #[test]
    fn test_period_lookup_bounds() {
        assert_eq!(period_for_pitch(0), None);
        assert_eq!(period_for_pitch(109), None);
    }

    #[test]
    fn test_period_table_monotonic_decreasing() {
        for i in 1..PERIOD_TABLE.len() {
            assert!(
                PERIOD_TABLE[i] < PERIOD_TABLE[i - 1],
                "Period table not decreasing at index {}: {} >= {}",
                i,
                PERIOD_TABLE[i],
                PERIOD_TABLE[i - 1]
            );
        }
    }

    #[test]
    fn test_octaves_halve_period() {
        // Each octave step roughly halves the period (integer rounding allowed)
        for i in 12..PERIOD_TABLE.len() {
            let expected = PERIOD_TABLE[i - 12] as i32 / 2;
            assert!((PERIOD_TABLE[i] as i32 - expected).abs() <= 1);
        }
    }

    #[test]
    fn test_vibrato_table_is_symmetric() {
        for i in 0..128 {
            assert_eq!(VIBRATO_TABLE[i], -VIBRATO_TABLE[i + 128]);
        }
    }
}
