//! Pattern position tracking
//!
//! Walks the song's pattern order one step at a time. The end of a pattern
//! is only acted upon when the next step is requested, so the last row of
//! the final pattern keeps sounding for its full step duration.

use crate::module::Song;

/// Result of advancing the sequencer by one pattern step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceResult {
    /// Moved to the next step of the same pattern.
    StepAdvanced,
    /// Moved to the first step of the next pattern.
    PatternAdvanced,
    /// Passed the stop position and jumped back to the repeat position.
    Looped,
    /// Passed the stop position with looping disabled.
    Completed,
}

/// Tracks the current pattern position and step.
#[derive(Debug, Clone)]
pub struct PatternSequencer {
    start_pos: u16,
    stop_pos: u16,
    repeat_pos: u16,
    pattern_length: u16,
    loop_enabled: bool,
    position: u16,
    /// Step about to be played (`None` before the first advance)
    step: Option<u16>,
}

impl PatternSequencer {
    /// Create a sequencer for `song`
    pub fn new(song: &Song, loop_enabled: bool) -> Self {
        PatternSequencer {
            start_pos: song.start_pos,
            stop_pos: song.stop_pos,
            repeat_pos: song.repeat_pos,
            pattern_length: song.pattern_length,
            loop_enabled,
            position: song.start_pos,
            step: None,
        }
    }

    /// Reset playback position to the song start.
    pub fn reset_position(&mut self) {
        self.position = self.start_pos;
        self.step = None;
    }

    /// Current pattern position
    pub fn position(&self) -> u16 {
        self.position
    }

    /// Step last played within the current pattern
    pub fn step(&self) -> Option<u16> {
        self.step
    }

    /// Move to the next step.
    pub fn advance(&mut self) -> AdvanceResult {
        let next = match self.step {
            None => return self.enter(0, AdvanceResult::StepAdvanced),
            Some(step) => step + 1,
        };

        if next < self.pattern_length {
            self.step = Some(next);
            return AdvanceResult::StepAdvanced;
        }

        if self.position >= self.stop_pos {
            if self.loop_enabled {
                self.position = self.repeat_pos;
                return self.enter(0, AdvanceResult::Looped);
            }
            return AdvanceResult::Completed;
        }

        self.position += 1;
        self.enter(0, AdvanceResult::PatternAdvanced)
    }

    fn enter(&mut self, step: u16, result: AdvanceResult) -> AdvanceResult {
        self.step = Some(step);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(pattern_length: u16, start: u16, stop: u16, repeat: u16) -> Song {
        Song {
            speed: 6,
            pattern_length,
            start_pos: start,
            stop_pos: stop,
            repeat_pos: repeat,
            interrupts_per_second: 50,
        }
    }

    #[test]
    fn test_single_pattern_completes_after_last_row() {
        let mut seq = PatternSequencer::new(&song(4, 0, 0, 0), false);
        for expected in 0..4 {
            assert_eq!(seq.advance(), AdvanceResult::StepAdvanced);
            assert_eq!(seq.step(), Some(expected));
        }
        assert_eq!(seq.advance(), AdvanceResult::Completed);
    }

    #[test]
    fn test_walks_pattern_order() {
        let mut seq = PatternSequencer::new(&song(2, 1, 2, 0), false);
        assert_eq!(seq.advance(), AdvanceResult::StepAdvanced);
        assert_eq!(seq.position(), 1);
        seq.advance();
        assert_eq!(seq.advance(), AdvanceResult::PatternAdvanced);
        assert_eq!((seq.position(), seq.step()), (2, Some(0)));
        seq.advance();
        assert_eq!(seq.advance(), AdvanceResult::Completed);
    }

    #[test]
    fn test_loops_to_repeat_position() {
        let mut seq = PatternSequencer::new(&song(1, 0, 1, 1), true);
        assert_eq!(seq.advance(), AdvanceResult::StepAdvanced);
        assert_eq!(seq.advance(), AdvanceResult::PatternAdvanced);
        assert_eq!(seq.advance(), AdvanceResult::Looped);
        assert_eq!((seq.position(), seq.step()), (1, Some(0)));
    }

    #[test]
    fn test_reset_rewinds() {
        let mut seq = PatternSequencer::new(&song(1, 3, 5, 3), false);
        seq.advance();
        seq.advance();
        seq.reset_position();
        assert_eq!(seq.position(), 3);
        assert_eq!(seq.step(), None);
    }
}
