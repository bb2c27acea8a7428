//! Playback Clocks
//!
//! Both timing domains run off the integer output-sample index `n`, so no
//! floating point error accumulates over long songs:
//! - [`InterruptClock`]: event `k` is due once `n * ips >= k * sample_rate`
//! - [`StepClock`]: step `k` is due once `n * 1000 >= ms_k * sample_rate`,
//!   with `ms_{k+1} = ms_k + 20 * speed` (speed may change between steps)

/// Step duration in milliseconds for a song speed.
///
/// `(60000 / 125) / (96 / speed / 4)`, kept in integers.
pub fn step_millis(speed: u16) -> u64 {
    (60_000 / 125) * 4 * speed as u64 / 96
}

/// Fast effect clock (vibrato, envelopes, instrument effects)
#[derive(Debug, Clone)]
pub struct InterruptClock {
    sample_rate: u64,
    interrupts_per_second: u64,
    /// Index of the next interrupt
    next: u64,
}

impl InterruptClock {
    /// Create a clock whose first interrupt is due at sample 0
    pub fn new(sample_rate: u32, interrupts_per_second: u16) -> Self {
        InterruptClock {
            sample_rate: sample_rate as u64,
            interrupts_per_second: interrupts_per_second as u64,
            next: 0,
        }
    }

    /// Consume one due interrupt at sample index `n`, if any
    pub fn poll(&mut self, n: u64) -> bool {
        if n * self.interrupts_per_second >= self.next * self.sample_rate {
            self.next += 1;
            true
        } else {
            false
        }
    }

    /// Interrupts fired so far
    pub fn fired(&self) -> u64 {
        self.next
    }

    /// Rewind to the first interrupt
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Pattern step clock
#[derive(Debug, Clone)]
pub struct StepClock {
    sample_rate: u64,
    /// Millisecond timestamp of the next step, `None` while paused
    next_ms: Option<u64>,
}

impl StepClock {
    /// Create a clock whose first step is due at sample 0
    pub fn new(sample_rate: u32) -> Self {
        StepClock {
            sample_rate: sample_rate as u64,
            next_ms: Some(0),
        }
    }

    /// Consume the due step at sample index `n`, if any.
    ///
    /// After a step fires the clock waits for [`StepClock::schedule`].
    pub fn poll(&mut self, n: u64) -> Option<u64> {
        let due = self.next_ms?;
        if n * 1000 >= due * self.sample_rate {
            Some(due)
        } else {
            None
        }
    }

    /// Schedule the step after the one at `fired_ms` using the current speed.
    ///
    /// Speed 0 pauses the clock.
    pub fn schedule(&mut self, fired_ms: u64, speed: u16) {
        self.next_ms = (speed > 0).then(|| fired_ms + step_millis(speed));
    }

    /// Whether the clock is paused by speed 0
    pub fn is_paused(&self) -> bool {
        self.next_ms.is_none()
    }

    /// Timestamp of the next step
    pub fn next_ms(&self) -> Option<u64> {
        self.next_ms
    }

    /// Rewind so the first step is due at sample 0
    pub fn reset(&mut self) {
        self.next_ms = Some(0);
    }
}
