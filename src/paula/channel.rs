//! Paula DMA Channel
//!
//! One of the four audio DMA channels. A channel plays a snapshot of its
//! source taken when it is started. When playback runs past the end of the
//! snapshot it either re-snapshots the loop region from the *current* source
//! (so waveform effects become audible on the next cycle) or stops.
//!
//! Playback position is kept in 32.32 fixed point and advanced once per
//! output sample by `clock / (2 * period) / sample_rate`.

use crate::constants::MAX_VOLUME;

const FRAC_BITS: u32 = 32;
const FRAC_ONE: f64 = (1u64 << FRAC_BITS) as f64;

/// Channel state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Nothing to play
    Idle,
    /// Source layout set, waiting for [`PaulaChannel::start`]
    Armed,
    /// DMA running
    Playing,
}

/// Outcome of sampling a channel once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Channel not playing; output is silence
    Silent,
    /// Sample produced, still inside the snapshot
    Playing,
    /// Sample produced, playback wrapped into the loop region
    Looped,
    /// Sample produced, playback reached the end without a loop and stopped
    Finished,
}

/// Which part of a source buffer the channel plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLayout {
    /// Bytes played from the start of the source
    pub length: usize,
    /// Loop region `[start, end)` replayed after the first pass
    pub loop_region: Option<(usize, usize)>,
}

impl SourceLayout {
    /// Layout for an instrument's word-sized length/repeat pair.
    ///
    /// A repeat of 0 or 1 words means "no loop": waveforms then cycle over
    /// their one-shot part, samples play once.
    pub fn from_words(length: u16, repeat: u16, waveform: bool, source_len: usize) -> Self {
        let one_shot = (length as usize * 2).min(source_len);
        if repeat > 1 {
            let end = (length as usize * 2 + repeat as usize * 2).min(source_len);
            let region = (end > one_shot).then_some((one_shot, end));
            SourceLayout {
                length: end,
                loop_region: region,
            }
        } else {
            SourceLayout {
                length: one_shot,
                loop_region: (waveform && one_shot > 0).then_some((0, one_shot)),
            }
        }
    }
}

/// A single Paula audio channel
#[derive(Debug, Clone)]
pub struct PaulaChannel {
    state: ChannelState,
    layout: SourceLayout,
    /// Playback snapshot
    buffer: Vec<i8>,
    /// Read position, 32.32 fixed point
    position: u64,
    increment: u64,
    period: u16,
    volume: u8,
    clock_hz: f64,
    sample_rate: u32,
    started_at: u64,
}

impl PaulaChannel {
    /// Create an idle channel
    pub fn new(clock_hz: f64, sample_rate: u32) -> Self {
        PaulaChannel {
            state: ChannelState::Idle,
            layout: SourceLayout::default(),
            buffer: Vec::new(),
            position: 0,
            increment: 0,
            period: 0,
            volume: 0,
            clock_hz,
            sample_rate,
            started_at: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether DMA is running
    pub fn is_playing(&self) -> bool {
        self.state == ChannelState::Playing
    }

    /// Current period
    pub fn period(&self) -> u16 {
        self.period
    }

    /// Current volume (0..=64)
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Sample index at which playback last started
    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    /// Integer read index inside the current snapshot
    pub fn read_index(&self) -> usize {
        (self.position >> FRAC_BITS) as usize
    }

    /// Set the period; 0 halts the read position
    pub fn set_period(&mut self, period: u16) {
        self.period = period;
        self.increment = if period == 0 {
            0
        } else {
            let rate = self.clock_hz / (2.0 * period as f64);
            (rate / self.sample_rate as f64 * FRAC_ONE) as u64
        };
    }

    /// Set the volume, clamped to 64
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
    }

    /// Configure the source layout used by the next start and loop
    pub fn set_source(&mut self, layout: SourceLayout) {
        self.layout = layout;
        if self.state == ChannelState::Idle {
            self.state = ChannelState::Armed;
        }
    }

    /// Snapshot `source` and start playback at sample index `at`
    pub fn start(&mut self, at: u64, source: &[i8]) {
        let length = self.layout.length.min(source.len());
        self.buffer.clear();
        self.buffer.extend_from_slice(&source[..length]);
        self.position = 0;
        self.started_at = at;
        self.state = if length == 0 {
            ChannelState::Idle
        } else {
            ChannelState::Playing
        };
    }

    /// Stop DMA immediately
    pub fn stop(&mut self) {
        self.state = ChannelState::Idle;
        self.buffer.clear();
        self.position = 0;
    }

    /// Back to the power-on state
    pub fn reset(&mut self) {
        self.stop();
        self.layout = SourceLayout::default();
        self.increment = 0;
        self.period = 0;
        self.volume = 0;
        self.started_at = 0;
    }

    fn loop_region(&self, source: &[i8]) -> Option<(usize, usize)> {
        let (start, end) = self.layout.loop_region?;
        let end = end.min(source.len());
        (start < end).then_some((start, end))
    }

    /// Produce one output sample and advance by one output period.
    ///
    /// `source` is the channel's current source buffer; it is only read when
    /// playback wraps into the loop region.
    pub fn sample(&mut self, source: &[i8]) -> (f32, ChannelStatus) {
        if self.state != ChannelState::Playing || self.buffer.is_empty() {
            return (0.0, ChannelStatus::Silent);
        }

        let index = self.read_index().min(self.buffer.len() - 1);
        let frac = (self.position & ((1u64 << FRAC_BITS) - 1)) as f32 / FRAC_ONE as f32;
        let current = self.buffer[index] as f32;
        let next = match self.buffer.get(index + 1) {
            Some(&s) => s as f32,
            None => match self.loop_region(source) {
                Some((start, _)) => source[start] as f32,
                None => current,
            },
        };
        let value = current + (next - current) * frac;
        let output = value / 128.0 * (self.volume as f32 / MAX_VOLUME as f32);

        self.position += self.increment;
        let end = (self.buffer.len() as u64) << FRAC_BITS;
        if self.position < end {
            return (output, ChannelStatus::Playing);
        }

        match self.loop_region(source) {
            Some((start, stop)) => {
                let overflow = self.position - end;
                self.buffer.clear();
                self.buffer.extend_from_slice(&source[start..stop]);
                let loop_len = (self.buffer.len() as u64) << FRAC_BITS;
                self.position = overflow % loop_len;
                (output, ChannelStatus::Looped)
            }
            None => {
                self.stop();
                (output, ChannelStatus::Finished)
            }
        }
    }
}
