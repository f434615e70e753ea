//! Generation-checked one-shot timers.
//!
//! The reducer never sleeps. Arming a timer bumps its generation and returns
//! a `ScheduleTimer` effect; the runtime sleeps and sends `TimerFired` back
//! with the generation it was given. A fire whose generation no longer
//! matches (re-armed or disarmed in between) is ignored, so at most one fire
//! per slot is ever acted on.

use std::time::{Duration, Instant};

use crate::effects::UiEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Return from Main-with-queue to QueueSelection after inactivity.
    AutoReturn,
    /// Delay between a correct scan and the completion request.
    ScanConfirm,
    /// Delay between the "not in queue" alert and the LMS lookup.
    LmsLookup,
    /// Degraded-mode polling.
    Poll,
}

#[derive(Debug, Default, Clone)]
pub struct TimerSlot {
    generation: u64,
    armed: bool,
}

impl TimerSlot {
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn arm(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.armed = true;
        self.generation
    }

    fn disarm(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.armed = false;
    }

    /// Consumes a fire. Returns `false` for stale generations.
    fn accept(&mut self, generation: u64) -> bool {
        let ok = self.armed && self.generation == generation;
        if ok {
            self.armed = false;
        }
        ok
    }
}

#[derive(Debug, Clone)]
pub struct Timers {
    pub auto_return: TimerSlot,
    pub scan_confirm: TimerSlot,
    pub lms_lookup: TimerSlot,
    pub poll: TimerSlot,
    /// Last user activity (key, mouse, scroll).
    pub last_activity: Instant,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            auto_return: TimerSlot::default(),
            scan_confirm: TimerSlot::default(),
            lms_lookup: TimerSlot::default(),
            poll: TimerSlot::default(),
            last_activity: Instant::now(),
        }
    }
}

impl Timers {
    fn slot_mut(&mut self, kind: TimerKind) -> &mut TimerSlot {
        match kind {
            TimerKind::AutoReturn => &mut self.auto_return,
            TimerKind::ScanConfirm => &mut self.scan_confirm,
            TimerKind::LmsLookup => &mut self.lms_lookup,
            TimerKind::Poll => &mut self.poll,
        }
    }

    pub fn slot(&self, kind: TimerKind) -> &TimerSlot {
        match kind {
            TimerKind::AutoReturn => &self.auto_return,
            TimerKind::ScanConfirm => &self.scan_confirm,
            TimerKind::LmsLookup => &self.lms_lookup,
            TimerKind::Poll => &self.poll,
        }
    }

    /// Arms (or re-arms) a timer and returns the effect that schedules it.
    pub fn schedule(&mut self, kind: TimerKind, after: Duration) -> UiEffect {
        let generation = self.slot_mut(kind).arm();
        UiEffect::ScheduleTimer {
            kind,
            generation,
            after,
        }
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        self.slot_mut(kind).disarm();
    }

    pub fn accept(&mut self, kind: TimerKind, generation: u64) -> bool {
        self.slot_mut(kind).accept(generation)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}
