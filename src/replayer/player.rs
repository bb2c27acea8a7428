//! Sequencer/Mixer
//!
//! [`SonicPlayer`] owns global playback time. Per output frame it:
//! 1. samples the four Paula channels and mixes them to PCM
//! 2. advances the frame index `n`
//! 3. dispatches a due pattern step (notes to all four tracks)
//! 4. runs due interrupts (`tick` on all four tracks)
//!
//! Frames are rendered ahead into a [`SampleRing`] one second at a time and
//! handed out by [`SonicPlayer::read`].

use super::clock::{InterruptClock, StepClock};
use super::sequencer::{AdvanceResult, PatternSequencer};
use super::track::{GlobalCommand, TrackState};
use super::PlayerConfig;
use crate::constants::{
    CHANNEL_COUNT, MAX_INTERRUPTS_PER_SECOND, MAX_READ_MILLIS, MIN_INTERRUPTS_PER_SECOND,
};
use crate::module::{Module, Song};
use crate::paula::{ChannelStatus, Paula};
use crate::streaming::{ring_frames, SampleRing, REFILL_SECONDS};
use crate::{Result, SonicError};
use serde::Serialize;
use std::sync::Arc;

/// Where playback currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackPosition {
    /// Pattern position in the song order
    pub song_position: u16,
    /// Step within the pattern (`None` before the first step)
    pub step: Option<u16>,
    /// Milliseconds of audio handed out by `read`
    pub elapsed_ms: u64,
    /// Active pattern step speed
    pub speed: u16,
}

/// Pull-based playback session for one song of a module
#[derive(Debug)]
pub struct SonicPlayer {
    module: Arc<Module>,
    config: PlayerConfig,
    song: Song,
    paula: Paula,
    tracks: [TrackState; CHANNEL_COUNT],
    sequencer: PatternSequencer,
    steps: StepClock,
    interrupts: InterruptClock,
    speed: u16,
    /// Frames rendered (the playback time base)
    frame: u64,
    /// Sum of all `read` durations
    requested_ms: u64,
    /// Frames handed out by `read`
    delivered: u64,
    ring: SampleRing<i8>,
    /// Sequencer passed the stop position
    engine_done: bool,
    end_of_stream: bool,
}

/// Convert a mixed level in [-1, 1] to a signed 8-bit sample
#[inline]
fn to_pcm(level: f32) -> i8 {
    (level * 128.0).round().clamp(-128.0, 127.0) as i8
}

impl SonicPlayer {
    /// Start a session on `config.song_index` of `module`.
    ///
    /// # Errors
    ///
    /// `Range` for a bad song index, sample rate, master volume or an
    /// interrupt rate outside [1, 200]; `Format` for a zero pattern length.
    pub fn new(module: Arc<Module>, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let song = *module.songs.get(config.song_index).ok_or_else(|| {
            SonicError::range(format!(
                "song index {} outside [0, {})",
                config.song_index,
                module.songs.len()
            ))
        })?;
        if !(MIN_INTERRUPTS_PER_SECOND..=MAX_INTERRUPTS_PER_SECOND)
            .contains(&song.interrupts_per_second)
        {
            return Err(SonicError::range(format!(
                "song {} runs {} interrupts per second, supported range is [{}, {}]",
                config.song_index,
                song.interrupts_per_second,
                MIN_INTERRUPTS_PER_SECOND,
                MAX_INTERRUPTS_PER_SECOND
            )));
        }
        if song.pattern_length == 0 {
            return Err(SonicError::format(format!(
                "song {} has a pattern length of 0",
                config.song_index
            )));
        }

        let ring = SampleRing::new(ring_frames(config.sample_rate) * config.channels())?;
        tracing::debug!(
            song = config.song_index,
            rate = config.sample_rate,
            stereo = config.stereo,
            speed = song.speed,
            ips = song.interrupts_per_second,
            "player created"
        );

        Ok(SonicPlayer {
            paula: Paula::new(
                config.clock.clock_hz(),
                config.sample_rate,
                config.master_volume,
            ),
            tracks: std::array::from_fn(TrackState::new),
            sequencer: PatternSequencer::new(&song, config.loop_song),
            steps: StepClock::new(config.sample_rate),
            interrupts: InterruptClock::new(config.sample_rate, song.interrupts_per_second),
            speed: song.speed,
            frame: 0,
            requested_ms: 0,
            delivered: 0,
            ring,
            engine_done: false,
            end_of_stream: false,
            module,
            config,
            song,
        })
    }

    /// Rewind to the song's start position with fresh channel state.
    ///
    /// Channel mutes survive; everything else restarts, so replaying the
    /// same `read` calls reproduces the same bytes.
    pub fn reset(&mut self) {
        self.paula.reset();
        self.tracks = std::array::from_fn(TrackState::new);
        self.sequencer.reset_position();
        self.steps.reset();
        self.interrupts.reset();
        self.speed = self.song.speed;
        self.frame = 0;
        self.requested_ms = 0;
        self.delivered = 0;
        self.ring.clear();
        self.engine_done = false;
        self.end_of_stream = false;
    }

    /// Render the next `milliseconds` of audio (at most 1000).
    ///
    /// Returns signed 8-bit PCM, interleaved left/right in stereo. The last
    /// chunk of a song may be short.
    ///
    /// # Errors
    ///
    /// `Range` above 1000 ms, `EndOfStream` once the song has ended, and any
    /// error raised while dispatching notes. An error ends the session.
    pub fn read(&mut self, milliseconds: u32) -> Result<Vec<i8>> {
        if milliseconds > MAX_READ_MILLIS {
            return Err(SonicError::range(format!(
                "read of {milliseconds} ms exceeds {MAX_READ_MILLIS} ms"
            )));
        }
        if self.end_of_stream {
            return Err(SonicError::EndOfStream);
        }

        let channels = self.config.channels();
        self.requested_ms += milliseconds as u64;
        let target = self.requested_ms * self.config.sample_rate as u64 / 1000;
        let wanted = (target - self.delivered) as usize * channels;

        if let Err(err) = self.fill(wanted) {
            self.end_of_stream = true;
            return Err(err);
        }

        let mut out = vec![0i8; wanted.min(self.ring.available_read())];
        let read = self.ring.read(&mut out);
        out.truncate(read);
        self.delivered += (read / channels) as u64;

        if self.engine_done && self.ring.is_empty() {
            tracing::debug!(frames = self.delivered, "end of stream");
            self.end_of_stream = true;
        }
        Ok(out)
    }

    /// Whether the song has ended and everything rendered was read
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Render until `wanted` samples plus one frame of lookahead are buffered.
    ///
    /// The lookahead lets the read that drains the last frame see the end.
    fn fill(&mut self, wanted: usize) -> Result<()> {
        let channels = self.config.channels();
        while !self.engine_done && self.ring.available_read() < wanted + channels {
            let room = self.ring.available_write() / channels;
            let frames = room.min(self.config.sample_rate as usize * REFILL_SECONDS);
            if frames == 0 {
                break;
            }
            self.render(frames)?;
        }
        Ok(())
    }

    fn render(&mut self, frames: usize) -> Result<()> {
        for _ in 0..frames {
            if self.engine_done {
                break;
            }
            self.render_frame();
            self.frame += 1;
            self.run_due_step()?;
            if self.engine_done {
                break;
            }
            while self.interrupts.poll(self.frame) {
                self.tick_tracks();
            }
        }
        Ok(())
    }

    fn render_frame(&mut self) {
        let module = &*self.module;
        let tracks = &self.tracks;
        let sampled = self.paula.sample_channels(|i| tracks[i].source(module));

        for (track, (_, status)) in self.tracks.iter_mut().zip(sampled.iter()) {
            if *status == ChannelStatus::Finished {
                track.channel_finished();
            }
        }

        let levels = sampled.map(|(level, _)| level);
        let mixer = self.paula.mixer_mut();
        if self.config.stereo {
            let (left, right) = mixer.mix_stereo(&levels);
            self.ring.write(&[to_pcm(left), to_pcm(right)]);
        } else {
            let mono = mixer.mix_mono(&levels);
            self.ring.push(to_pcm(mono));
        }
    }

    fn run_due_step(&mut self) -> Result<()> {
        let Some(due_ms) = self.steps.poll(self.frame) else {
            return Ok(());
        };

        match self.sequencer.advance() {
            AdvanceResult::Completed => {
                tracing::debug!(
                    position = self.sequencer.position(),
                    at_ms = due_ms,
                    "stop position passed"
                );
                self.engine_done = true;
                return Ok(());
            }
            AdvanceResult::Looped => {
                tracing::debug!(position = self.sequencer.position(), "song looped");
            }
            AdvanceResult::StepAdvanced | AdvanceResult::PatternAdvanced => {}
        }

        self.dispatch_row()?;

        if self.speed == 0 {
            tracing::warn!(at_ms = due_ms, "speed 0 pauses the pattern step clock");
        }
        self.steps.schedule(due_ms, self.speed);
        Ok(())
    }

    /// Hand the current step's note to each track
    fn dispatch_row(&mut self) -> Result<()> {
        let position = self.sequencer.position() as usize;
        let step = self.sequencer.step().unwrap_or(0) as usize;

        for ch in 0..CHANNEL_COUNT {
            let voice_index = position * CHANNEL_COUNT + ch;
            let voice = *self.module.voices.get(voice_index).ok_or_else(|| {
                SonicError::format(format!(
                    "position {position} needs voice {voice_index} but the module has {}",
                    self.module.voices.len()
                ))
            })?;
            let note_index = voice.note_address as usize + step;
            let note = *self.module.notes.get(note_index).ok_or_else(|| {
                SonicError::format(format!(
                    "position {position} step {step} channel {ch} reads note {note_index} \
                     but the module has {}",
                    self.module.notes.len()
                ))
            })?;

            tracing::trace!(
                position,
                step,
                channel = ch,
                pitch = note.pitch,
                instrument = note.instrument,
                command = note.command,
                "step"
            );

            let command = self.tracks[ch].play_note(
                &note,
                &voice,
                &self.module,
                &mut self.paula.channels_mut()[ch],
                self.frame,
            )?;
            match command {
                Some(GlobalCommand::SetSpeed(speed)) => self.speed = speed,
                Some(GlobalCommand::SetFilter(enabled)) => {
                    self.paula.mixer_mut().set_filter(enabled)
                }
                None => {}
            }
        }
        Ok(())
    }

    fn tick_tracks(&mut self) {
        for (track, channel) in self.tracks.iter_mut().zip(self.paula.channels_mut()) {
            track.tick(&self.module, channel);
        }
    }

    /// Mute or unmute one of the four output channels
    pub fn set_channel_mute(&mut self, channel: usize, mute: bool) -> Result<()> {
        if channel >= CHANNEL_COUNT {
            return Err(SonicError::range(format!(
                "channel {channel} outside [0, {}]",
                CHANNEL_COUNT - 1
            )));
        }
        self.paula.mixer_mut().set_channel_mute(channel, mute);
        Ok(())
    }

    /// Whether `channel` is muted (channels past 3 never are)
    pub fn is_channel_muted(&self, channel: usize) -> bool {
        self.paula.mixer().is_channel_muted(channel)
    }

    /// Whether the hardware low-pass filter is switched on
    pub fn filter_enabled(&self) -> bool {
        self.paula.mixer().filter_enabled()
    }

    /// Current song position, step, elapsed time and speed
    pub fn position(&self) -> PlaybackPosition {
        PlaybackPosition {
            song_position: self.sequencer.position(),
            step: self.sequencer.step(),
            elapsed_ms: self.delivered * 1000 / self.config.sample_rate as u64,
            speed: self.speed,
        }
    }

    /// Session configuration
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// The module being played
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Channel emulation state
    pub fn paula(&self) -> &Paula {
        &self.paula
    }

    /// Note/effect state of one track
    pub fn track(&self, channel: usize) -> Option<&TrackState> {
        self.tracks.get(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Dialect, Instrument, Note, Sample, Voice};

    /// One pattern of `rows` steps; `notes` fill channel 0, other channels rest
    fn module(rows: u16, speed: u16, channel0: &[Note]) -> Arc<Module> {
        let mut m = Module::empty(Dialect::Chunked);
        m.songs.push(Song {
            speed,
            pattern_length: rows,
            start_pos: 0,
            stop_pos: 0,
            repeat_pos: 0,
            interrupts_per_second: 50,
        });
        let rest = rows;
        m.voices.push(Voice::default());
        for _ in 1..CHANNEL_COUNT {
            m.voices.push(Voice {
                note_address: rest,
                ..Default::default()
            });
        }
        m.notes.extend_from_slice(channel0);
        m.notes.resize(rows as usize, Note::default());
        m.notes.extend(std::iter::repeat(Note::default()).take(rows as usize));
        m.instruments.push(Instrument {
            length: 2,
            volume: 64,
            name: "square".into(),
            ..Default::default()
        });
        m.samples.push(Sample(vec![64, 32, -32, -64]));
        Arc::new(m)
    }

    fn one_note() -> Arc<Module> {
        module(4, 6, &[Note::from_raw(49, 1, 0, 0)])
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let m = one_note();
        let bad_song = PlayerConfig {
            song_index: 1,
            ..PlayerConfig::mono(22_050)
        };
        assert!(matches!(
            SonicPlayer::new(m.clone(), bad_song),
            Err(SonicError::Range(_))
        ));
        assert!(matches!(
            SonicPlayer::new(m.clone(), PlayerConfig::mono(100)),
            Err(SonicError::Range(_))
        ));

        let mut fast = (*m).clone();
        fast.songs[0].interrupts_per_second = 201;
        assert!(matches!(
            SonicPlayer::new(Arc::new(fast), PlayerConfig::mono(22_050)),
            Err(SonicError::Range(_))
        ));
    }

    #[test]
    fn test_first_frame_silent_then_note() {
        let mut player = SonicPlayer::new(one_note(), PlayerConfig::mono(22_168)).unwrap();
        let out = player.read(120).unwrap();
        assert_eq!(out.len(), 2660);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 64);
        assert!(out.iter().all(|&b| (-64..=64).contains(&b)));
    }

    #[test]
    fn test_read_limit() {
        let mut player = SonicPlayer::new(one_note(), PlayerConfig::mono(22_050)).unwrap();
        assert!(matches!(player.read(1001), Err(SonicError::Range(_))));
        assert!(player.read(1000).is_ok());
    }

    #[test]
    fn test_end_of_stream_after_last_step() {
        let mut player = SonicPlayer::new(one_note(), PlayerConfig::mono(22_050)).unwrap();
        let mut total = 0;
        for _ in 0..4 {
            total += player.read(120).unwrap().len();
        }
        assert_eq!(total, 4 * 2646);
        assert!(player.is_end_of_stream());
        assert!(matches!(player.read(10), Err(SonicError::EndOfStream)));
    }

    #[test]
    fn test_speed_command_changes_step_length() {
        let notes = [Note::from_raw(49, 1, 0x0F, 3)];
        let mut player = SonicPlayer::new(module(2, 6, &notes), PlayerConfig::mono(2_000)).unwrap();
        // speed 3: steps at 0 and 60 ms, stop at 120 ms
        let out = player.read(1000).unwrap();
        assert_eq!(out.len(), 240);
        assert!(player.is_end_of_stream());
        assert_eq!(player.position().speed, 3);
    }

    #[test]
    fn test_unknown_command_ends_session() {
        let notes = [Note::from_raw(49, 1, 0x05, 0)];
        let mut player =
            SonicPlayer::new(module(4, 6, &notes), PlayerConfig::mono(22_050)).unwrap();
        assert!(matches!(
            player.read(100),
            Err(SonicError::UnsupportedFeature(_))
        ));
        assert!(matches!(player.read(100), Err(SonicError::EndOfStream)));
    }

    #[test]
    fn test_mute_and_filter() {
        let notes = [Note::from_raw(49, 1, 0x0E, 1)];
        let mut player =
            SonicPlayer::new(module(4, 6, &notes), PlayerConfig::mono(22_050)).unwrap();
        assert!(player.set_channel_mute(4, true).is_err());
        player.set_channel_mute(0, true).unwrap();
        assert!(player.is_channel_muted(0));
        let out = player.read(50).unwrap();
        assert!(out.iter().all(|&b| b == 0));
        assert!(player.filter_enabled());

        player.reset();
        assert!(player.is_channel_muted(0));
        assert!(!player.filter_enabled());
    }

    #[test]
    fn test_position_tracks_steps() {
        let mut player = SonicPlayer::new(one_note(), PlayerConfig::mono(20_000)).unwrap();
        assert_eq!(player.position().step, None);
        player.read(130).unwrap();
        let pos = player.position();
        assert_eq!(pos.song_position, 0);
        assert_eq!(pos.elapsed_ms, 130);
        assert!(pos.step.is_some());
    }
}
