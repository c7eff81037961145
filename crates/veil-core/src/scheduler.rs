//! Reapplication scheduler
//!
//! A two-state machine (Idle/Pending) that turns bursts of triggers into one
//! render pass. Time is passed in as milliseconds from an arbitrary epoch so
//! the host decides what a clock is; nothing here sleeps.
//!
//! - Idle + trigger: Pending, due after the coalescing window (or at the end
//!   of the cooldown of the previous pass, whichever is later)
//! - Pending + trigger: dropped
//! - Pending and due: back to Idle *before* the pass runs, so triggers raised
//!   while the pass is applied arm a fresh pending pass
//!
//! A pass in flight blocks any other pass from starting until it finishes.

use crate::types::HostSignal;

/// Coalescing window applied to every trigger.
pub const COALESCE_WINDOW_MS: u64 = 150;
/// Quiet period after a pass before the next one may start.
pub const COOLDOWN_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub window_ms: u64,
    pub cooldown_ms: u64,
    /// One extra pass this long after a pass that hid new items
    pub recheck_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_ms: COALESCE_WINDOW_MS,
            cooldown_ms: COOLDOWN_MS,
            recheck_ms: None,
        }
    }
}

/// What caused a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Overlay start-up
    Initial,
    /// Candidate containers were added or removed
    Structure,
    /// A host signal (navigation, visibility restore)
    Signal(HostSignal),
    /// Pattern lists were edited as free text
    SettingsEdited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending { due_at: u64 },
}

/// Result of feeding a trigger to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A new pass is now pending
    Armed { due_at: u64 },
    /// A pass was already pending; the trigger was merged into it
    Coalesced { due_at: u64 },
}

impl Schedule {
    pub fn due_at(self) -> u64 {
        match self {
            Self::Armed { due_at } | Self::Coalesced { due_at } => due_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub triggers: u64,
    pub coalesced: u64,
    pub passes: u64,
    pub rechecks: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    in_flight: bool,
    cooldown_until: u64,
    recheck_at: Option<u64>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            in_flight: false,
            cooldown_until: 0,
            recheck_at: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn trigger(&mut self, trigger: Trigger, now: u64) -> Schedule {
        self.stats.triggers += 1;
        match self.state {
            SchedulerState::Pending { due_at } => {
                self.stats.coalesced += 1;
                log::trace!("Coalesced {:?} into pass due at {}", trigger, due_at);
                Schedule::Coalesced { due_at }
            }
            SchedulerState::Idle => {
                let due_at = now.saturating_add(self.config.window_ms).max(self.cooldown_until);
                self.state = SchedulerState::Pending { due_at };
                log::trace!("Armed pass for {:?}, due at {}", trigger, due_at);
                Schedule::Armed { due_at }
            }
        }
    }

    /// Earliest time a pass wants to run.
    pub fn next_due(&self) -> Option<u64> {
        let pending = match self.state {
            SchedulerState::Pending { due_at } => Some(due_at),
            SchedulerState::Idle => None,
        };
        match (pending, self.recheck_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Start a scheduled pass if one is due. Returns false when nothing is due
    /// or a pass is already in flight.
    pub fn begin_due(&mut self, now: u64) -> bool {
        if self.in_flight {
            return false;
        }

        if let SchedulerState::Pending { due_at } = self.state {
            if now >= due_at {
                self.state = SchedulerState::Idle;
                // A pending pass also covers a recheck due by now
                if self.recheck_at.map_or(false, |at| at <= now) {
                    self.recheck_at = None;
                }
                self.start();
                return true;
            }
        }

        if self.recheck_at.map_or(false, |at| at <= now) {
            self.recheck_at = None;
            self.stats.rechecks += 1;
            self.start();
            return true;
        }

        false
    }

    /// Start an unscheduled pass (explicit apply, quick-add).
    pub fn begin_immediate(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.start();
        true
    }

    fn start(&mut self) {
        self.in_flight = true;
        self.stats.passes += 1;
    }

    /// Mark the in-flight pass finished. `hid_new_items` arms the follow-up
    /// recheck when one is configured.
    pub fn finish(&mut self, now: u64, hid_new_items: bool) {
        self.in_flight = false;
        self.cooldown_until = now.saturating_add(self.config.cooldown_ms);

        // Triggers raised during the pass wait out the cooldown
        if let SchedulerState::Pending { due_at } = self.state {
            self.state = SchedulerState::Pending {
                due_at: due_at.max(self.cooldown_until),
            };
        }

        if hid_new_items && self.recheck_at.is_none() {
            if let Some(delay) = self.config.recheck_ms {
                self.recheck_at = Some(now.saturating_add(delay));
            }
        }
    }
}
