// Session state machine: Idle -> Running <-> Paused -> Completed, with stop back to Idle.
// A pure reducer driven by host ticks. It never blocks, never throws, and ignores ticks from dead epochs.

use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::SessionClock;
use crate::config::{CycleLimit, SessionConfig};
use crate::error::{SessionAction, StaleTick, TransitionError};
use crate::scheduler::FrameScheduler;
use crate::types::{micros_to_secs, Epoch, FrameHandle, PhaseKind, SessionStatus, Timestamp};
use crate::visual::{VisualMapper, VisualState};

/// Lifecycle callbacks. Every method defaults to a no-op.
pub trait SessionObserver {
    fn on_start(&mut self) {}

    /// Explicit stop. Never paired with `on_complete`.
    fn on_stop(&mut self) {}

    /// Fired exactly once per bounded run, with the active session length in seconds.
    fn on_complete(&mut self, _total_secs: f64) {}
}

impl SessionObserver for () {}

/// Read-only view of the session for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub phase_index: usize,
    pub phase_kind: PhaseKind,
    pub phase_label: String,
    /// Fraction of the current phase elapsed, in [0, 1].
    pub progress: f64,
    pub remaining_in_phase_seconds: f64,
    pub cycles_completed: u32,
    pub total_elapsed_seconds: f64,
    pub visual: VisualState,
}

/// Result of delivering a frame to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Session still running.
    Frame(SessionSnapshot),
    /// This tick finished the final cycle.
    Completed(SessionSnapshot),
    /// Tick did not belong to the live run and changed nothing.
    Discarded(StaleTick),
}

impl TickOutcome {
    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        match self {
            TickOutcome::Frame(s) | TickOutcome::Completed(s) => Some(s),
            TickOutcome::Discarded(_) => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, TickOutcome::Discarded(_))
    }
}

/// Mutable record of one run. Created by `start`, dropped on completion or stop.
#[derive(Debug, Clone)]
struct SessionState {
    status: SessionStatus,
    phase_index: usize,
    cycles_completed: u32,
    clock: SessionClock,
}

/// Drives one breathing session. Owns its state exclusively; not shared across sessions.
pub struct SessionController<O: SessionObserver, S: FrameScheduler> {
    config: SessionConfig,
    observer: O,
    scheduler: S,
    state: Option<SessionState>,
    /// Final snapshot of the last run that completed, kept for the UI.
    finished: Option<SessionSnapshot>,
    epoch: Epoch,
    pending_frame: Option<FrameHandle>,
}

impl<O: SessionObserver, S: FrameScheduler> SessionController<O, S> {
    pub fn new(config: SessionConfig, observer: O, scheduler: S) -> Self {
        SessionController {
            config,
            observer,
            scheduler,
            state: None,
            finished: None,
            epoch: Epoch::default(),
            pending_frame: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        match (&self.state, &self.finished) {
            (Some(state), _) => state.status,
            (None, Some(_)) => SessionStatus::Completed,
            (None, None) => SessionStatus::Idle,
        }
    }

    /// Epoch that frames must carry to be honoured.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Begin a fresh run. Rejected while a run is active; allowed again after completion.
    pub fn start(&mut self, now: Timestamp) -> Result<SessionSnapshot, TransitionError> {
        let status = self.status();
        if matches!(status, SessionStatus::Running | SessionStatus::Paused) {
            return Err(self.reject(SessionAction::Start, status));
        }

        self.invalidate_frames();
        self.finished = None;

        let mut clock = SessionClock::new();
        clock.start(now);
        let state = SessionState {
            status: SessionStatus::Running,
            phase_index: 0,
            cycles_completed: 0,
            clock,
        };
        let snapshot = build_snapshot(&self.config, &state, now);
        self.state = Some(state);

        info!(
            "breathing session started: {} phases per cycle, cycles {:?}, epoch {}",
            self.config.sequence().len(),
            self.config.cycles(),
            self.epoch
        );
        self.observer.on_start();
        self.schedule_next();

        Ok(snapshot)
    }

    /// Advance the session to `now`. Only frames from the current epoch while running take effect.
    pub fn tick(&mut self, epoch: Epoch, now: Timestamp) -> TickOutcome {
        let status = self.status();
        if epoch != self.epoch || status != SessionStatus::Running {
            let stale = StaleTick {
                tick_epoch: epoch,
                current_epoch: self.epoch,
                status,
            };
            debug!("{}", stale);
            return TickOutcome::Discarded(stale);
        }
        // The frame that delivered this tick has fired.
        self.pending_frame = None;

        let sequence = self.config.sequence();
        let cycles = self.config.cycles();
        let Some(state) = self.state.as_mut() else {
            return TickOutcome::Discarded(StaleTick {
                tick_epoch: epoch,
                current_epoch: self.epoch,
                status,
            });
        };

        // A late frame may cover several phase boundaries. Whole cycles are skipped in one step,
        // the rest are walked phase by phase.
        let mut completed = false;
        loop {
            if state.phase_index == 0 {
                skip_whole_cycles(state, sequence.cycle_us(), cycles, now);
            }
            let (phase, _) = sequence.entry(state.phase_index);
            if state.clock.elapsed_in_phase_us(now) < phase.duration_us() {
                break;
            }
            state.clock.advance_phase(phase.duration_us());

            if state.phase_index + 1 < sequence.len() {
                state.phase_index += 1;
                debug!(
                    "phase {} ({}) began at {:.3}s",
                    state.phase_index,
                    sequence.entry(state.phase_index).0.label(),
                    micros_to_secs(state.clock.completed_us())
                );
                continue;
            }

            state.cycles_completed = state.cycles_completed.saturating_add(1);
            debug!("cycle {} complete", state.cycles_completed);
            if cycles.is_reached(state.cycles_completed) {
                completed = true;
                break;
            }
            state.phase_index = 0;
        }

        if completed {
            return self.complete(now);
        }

        let snapshot = build_snapshot(&self.config, state, now);
        self.schedule_next();
        TickOutcome::Frame(snapshot)
    }

    pub fn pause(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        let status = self.status();
        if status != SessionStatus::Running {
            return Err(self.reject(SessionAction::Pause, status));
        }
        self.invalidate_frames();
        if let Some(state) = self.state.as_mut() {
            state.clock.pause(now);
            state.status = SessionStatus::Paused;
            debug!(
                "session paused at {:.3}s",
                micros_to_secs(state.clock.elapsed_total_us(now))
            );
        }
        Ok(())
    }

    pub fn resume(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        let status = self.status();
        if status != SessionStatus::Paused {
            return Err(self.reject(SessionAction::Resume, status));
        }
        if let Some(state) = self.state.as_mut() {
            state.clock.resume(now);
            state.status = SessionStatus::Running;
            debug!("session resumed, epoch {}", self.epoch);
        }
        self.schedule_next();
        Ok(())
    }

    /// Abandon the run. Cancels the pending frame and fires `on_stop`, never `on_complete`.
    pub fn stop(&mut self) -> Result<(), TransitionError> {
        let status = self.status();
        if !matches!(status, SessionStatus::Running | SessionStatus::Paused) {
            return Err(self.reject(SessionAction::Stop, status));
        }
        self.invalidate_frames();
        if let Some(state) = self.state.take() {
            info!(
                "breathing session stopped after {} cycles",
                state.cycles_completed
            );
        }
        self.observer.on_stop();
        Ok(())
    }

    /// Current view of the session. After completion this is the final snapshot.
    pub fn snapshot(&self, now: Timestamp) -> Option<SessionSnapshot> {
        match &self.state {
            Some(state) => Some(build_snapshot(&self.config, state, now)),
            None => self.finished.clone(),
        }
    }

    fn complete(&mut self, now: Timestamp) -> TickOutcome {
        let Some(state) = self.state.take() else {
            return TickOutcome::Discarded(StaleTick {
                tick_epoch: self.epoch,
                current_epoch: self.epoch,
                status: self.status(),
            });
        };
        // Active time is exactly the sum of finished phases; overshoot past the final boundary is not counted.
        let total_secs = micros_to_secs(state.clock.completed_us());

        let mut snapshot = build_snapshot(&self.config, &state, now);
        snapshot.status = SessionStatus::Completed;
        snapshot.progress = 1.0;
        snapshot.remaining_in_phase_seconds = 0.0;
        snapshot.total_elapsed_seconds = total_secs;
        let (phase, track) = self.config.sequence().entry(state.phase_index);
        snapshot.visual = self.config.geometry().render(phase, track, 1.0);

        self.invalidate_frames();
        self.finished = Some(snapshot.clone());

        info!(
            "breathing session completed: {} cycles in {:.3}s",
            state.cycles_completed, total_secs
        );
        self.observer.on_complete(total_secs);

        TickOutcome::Completed(snapshot)
    }

    fn reject(&self, action: SessionAction, status: SessionStatus) -> TransitionError {
        let err = TransitionError::Invalid { action, status };
        warn!("ignored: {}", err);
        err
    }

    /// Cancel any outstanding frame and move to a new epoch so late deliveries are discarded.
    fn invalidate_frames(&mut self) {
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        self.epoch = self.epoch.next();
    }

    fn schedule_next(&mut self) {
        self.pending_frame = self.scheduler.request_frame(self.epoch);
        if self.pending_frame.is_none() {
            warn!("scheduler did not return a frame handle for epoch {}", self.epoch);
        }
    }
}

impl<O: SessionObserver, S: FrameScheduler> Drop for SessionController<O, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
    }
}

/// Close every full cycle contained in the elapsed time of a cycle-start phase.
/// The final bounded cycle is left for the phase walk so completion takes the usual path.
fn skip_whole_cycles(state: &mut SessionState, cycle_us: u64, cycles: CycleLimit, now: Timestamp) {
    if cycle_us == 0 {
        return;
    }
    let mut whole = state.clock.elapsed_in_phase_us(now) / cycle_us;
    if let Some(bound) = cycles.bound() {
        let left = bound.saturating_sub(state.cycles_completed).saturating_sub(1);
        whole = whole.min(u64::from(left));
    }
    if whole == 0 {
        return;
    }
    // whole * cycle_us never exceeds the elapsed time, so it cannot overflow.
    state.clock.advance_phase(whole * cycle_us);
    let counted = u32::try_from(whole).unwrap_or(u32::MAX);
    state.cycles_completed = state.cycles_completed.saturating_add(counted);
    debug!("skipped {} whole cycles, {} complete", whole, state.cycles_completed);
}

fn build_snapshot(config: &SessionConfig, state: &SessionState, now: Timestamp) -> SessionSnapshot {
    let (phase, track) = config.sequence().entry(state.phase_index);
    let duration_us = phase.duration_us();
    let elapsed_us = state.clock.elapsed_in_phase_us(now).min(duration_us);
    let progress = (elapsed_us as f64 / duration_us as f64).clamp(0.0, 1.0);

    SessionSnapshot {
        status: state.status,
        phase_index: state.phase_index,
        phase_kind: phase.kind(),
        phase_label: phase.label().to_string(),
        progress,
        remaining_in_phase_seconds: micros_to_secs(duration_us - elapsed_us),
        cycles_completed: state.cycles_completed,
        total_elapsed_seconds: micros_to_secs(state.clock.elapsed_total_us(now)),
        visual: config.geometry().render(phase, track, progress),
    }
}

impl<O: SessionObserver, S: FrameScheduler> std::fmt::Debug for SessionController<O, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.status())
            .field("epoch", &self.epoch)
            .field("cycles", &self.config.cycles())
            .field("pending_frame", &self.pending_frame)
            .finish()
    }
}

/// True when this configuration loops until stopped.
pub fn is_continuous(config: &SessionConfig) -> bool {
    config.cycles() == CycleLimit::Infinite
}
