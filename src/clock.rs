// Session clock: elapsed time in the current phase and over the whole run.
// Progress is always derived from absolute timestamps; nothing is accumulated per tick.

use crate::types::Timestamp;

/// Tracks wall-clock progress of the current phase with drift-free pause/resume.
///
/// The clock holds a single anchor, the instant the current phase began. Pausing
/// freezes the elapsed value; resuming moves the anchor to `now - frozen`, so the
/// elapsed value picks up exactly where it stopped no matter how long the gap was
/// or how many times the session was paused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionClock {
    phase_start: Option<Timestamp>,
    paused_in_phase_us: Option<u64>,
    /// Sum of nominal durations of every phase already finished in this run.
    completed_us: u64,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the clock for a fresh run.
    pub fn start(&mut self, now: Timestamp) {
        *self = SessionClock {
            phase_start: Some(now),
            paused_in_phase_us: None,
            completed_us: 0,
        };
    }

    pub fn is_started(&self) -> bool {
        self.phase_start.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_in_phase_us.is_some()
    }

    /// Microseconds since the current phase began, excluding paused time.
    pub fn elapsed_in_phase_us(&self, now: Timestamp) -> u64 {
        if let Some(frozen) = self.paused_in_phase_us {
            return frozen;
        }
        match self.phase_start {
            Some(start) => now.saturating_since(start),
            None => 0,
        }
    }

    /// Microseconds of active time since the run started.
    pub fn elapsed_total_us(&self, now: Timestamp) -> u64 {
        self.completed_us
            .saturating_add(self.elapsed_in_phase_us(now))
    }

    /// Freeze elapsed time. No-op if already paused or never started.
    pub fn pause(&mut self, now: Timestamp) {
        if self.phase_start.is_none() || self.is_paused() {
            return;
        }
        self.paused_in_phase_us = Some(self.elapsed_in_phase_us(now));
    }

    /// Re-anchor so that `elapsed_in_phase_us(now)` equals the frozen value.
    pub fn resume(&mut self, now: Timestamp) {
        if let Some(frozen) = self.paused_in_phase_us.take() {
            self.phase_start = Some(now.saturating_sub_micros(frozen));
        }
    }

    /// Close the current phase of `duration_us` and start the next one at its exact boundary.
    ///
    /// Any overshoot past the boundary carries into the next phase.
    pub fn advance_phase(&mut self, duration_us: u64) {
        if let Some(start) = self.phase_start {
            self.phase_start = Some(start.saturating_add_micros(duration_us));
            self.completed_us = self.completed_us.saturating_add(duration_us);
        }
    }

    pub fn completed_us(&self) -> u64 {
        self.completed_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ts(us: u64) -> Timestamp {
        Timestamp::from_micros(us)
    }

    #[test]
    fn unstarted_clock_reads_zero() {
        let clock = SessionClock::new();
        assert_eq!(clock.elapsed_in_phase_us(ts(5_000_000)), 0);
        assert!(!clock.is_started());
    }

    #[test]
    fn elapsed_tracks_absolute_time() {
        let mut clock = SessionClock::new();
        clock.start(ts(1_000_000));
        assert_eq!(clock.elapsed_in_phase_us(ts(1_000_000)), 0);
        assert_eq!(clock.elapsed_in_phase_us(ts(3_500_000)), 2_500_000);
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let mut clock = SessionClock::new();
        clock.start(ts(0));
        clock.pause(ts(2_000_000));
        assert_eq!(clock.elapsed_in_phase_us(ts(50_000_000)), 2_000_000);
        assert_eq!(clock.elapsed_total_us(ts(50_000_000)), 2_000_000);

        clock.resume(ts(102_000_000));
        assert_eq!(clock.elapsed_in_phase_us(ts(102_000_000)), 2_000_000);
        assert_eq!(clock.elapsed_in_phase_us(ts(103_000_000)), 3_000_000);
    }

    #[test]
    fn double_pause_keeps_first_freeze() {
        let mut clock = SessionClock::new();
        clock.start(ts(0));
        clock.pause(ts(1_000_000));
        clock.pause(ts(9_000_000));
        assert_eq!(clock.elapsed_in_phase_us(ts(9_000_000)), 1_000_000);
    }

    #[test]
    fn resume_without_pause_is_noop() {
        let mut clock = SessionClock::new();
        clock.start(ts(0));
        clock.resume(ts(7_000_000));
        assert_eq!(clock.elapsed_in_phase_us(ts(7_000_000)), 7_000_000);
    }

    #[test]
    fn advance_carries_overshoot() {
        let mut clock = SessionClock::new();
        clock.start(ts(0));
        // Tick arrives 0.25s late for a 4s phase.
        let now = ts(4_250_000);
        clock.advance_phase(4_000_000);
        assert_eq!(clock.elapsed_in_phase_us(now), 250_000);
        assert_eq!(clock.elapsed_total_us(now), 4_250_000);
        assert_eq!(clock.completed_us(), 4_000_000);
    }

    proptest! {
        /// Repeated pauses of arbitrary length never shift the elapsed value.
        #[test]
        fn repeated_pause_resume_has_no_drift(
            segments in prop::collection::vec((1u64..5_000_000, 0u64..500_000_000), 1..20),
        ) {
            let mut clock = SessionClock::new();
            let mut now = 0u64;
            let mut active = 0u64;
            clock.start(ts(now));
            for (run, gap) in segments {
                now += run;
                active += run;
                clock.pause(ts(now));
                prop_assert_eq!(clock.elapsed_in_phase_us(ts(now)), active);
                now += gap;
                prop_assert_eq!(clock.elapsed_total_us(ts(now)), active);
                clock.resume(ts(now));
                prop_assert_eq!(clock.elapsed_in_phase_us(ts(now)), active);
            }
        }
    }
}
