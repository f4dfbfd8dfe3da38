//! Traffic signal phase controller
//!
//! One controller per junction. Time is consumed in milliseconds and a single
//! `update` may run through several phases when the tick is coarse.

use std::fmt;

use log::trace;

use super::config::{require_positive, SimConfig};
use super::error::SimError;
use super::types::Axis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    EwGreen,
    EwYellow,
    NsGreen,
    NsYellow,
    AllRed,
}

impl Phase {
    /// Axis that owns this phase; `None` for the all-red clearance
    pub fn axis(self) -> Option<Axis> {
        match self {
            Phase::EwGreen | Phase::EwYellow => Some(Axis::Horizontal),
            Phase::NsGreen | Phase::NsYellow => Some(Axis::Vertical),
            Phase::AllRed => None,
        }
    }

    pub fn is_green(self) -> bool {
        matches!(self, Phase::EwGreen | Phase::NsGreen)
    }

    fn green_for(axis: Axis) -> Phase {
        match axis {
            Axis::Horizontal => Phase::EwGreen,
            Axis::Vertical => Phase::NsGreen,
        }
    }
}

/// Phase durations in milliseconds, all strictly positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTimings {
    pub green_ms: f64,
    pub yellow_ms: f64,
    pub all_red_ms: f64,
}

impl SignalTimings {
    pub fn new(green_ms: f64, yellow_ms: f64, all_red_ms: f64) -> Result<Self, SimError> {
        require_positive("green_ms", green_ms)?;
        require_positive("yellow_ms", yellow_ms)?;
        require_positive("all_red_ms", all_red_ms)?;
        Ok(Self {
            green_ms,
            yellow_ms,
            all_red_ms,
        })
    }

    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        Self::new(config.green_ms, config.yellow_ms, config.all_red_ms)
    }

    pub fn duration(&self, phase: Phase) -> f64 {
        match phase {
            Phase::EwGreen | Phase::NsGreen => self.green_ms,
            Phase::EwYellow | Phase::NsYellow => self.yellow_ms,
            Phase::AllRed => self.all_red_ms,
        }
    }

    /// One full EW + NS rotation
    pub fn cycle_ms(&self) -> f64 {
        2.0 * (self.green_ms + self.yellow_ms + self.all_red_ms)
    }
}

/// Partial timing update; `None` fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingsUpdate {
    pub green_ms: Option<f64>,
    pub yellow_ms: Option<f64>,
    pub all_red_ms: Option<f64>,
}

/// Emitted to observers on every phase transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    pub remaining_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSnapshot {
    pub phase: Phase,
    pub remaining_ms: f64,
    pub timings: SignalTimings,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleStatistics {
    pub cycles_completed: u64,
    pub average_cycle_ms: f64,
    pub average_green_ms: f64,
}

pub type PhaseObserver = Box<dyn FnMut(&PhaseChange)>;

pub struct SignalController {
    phase: Phase,
    remaining_ms: f64,
    timings: SignalTimings,
    /// Axis served by the most recent green/yellow, decides who goes after all-red
    last_served: Axis,
    running: bool,
    observers: Vec<PhaseObserver>,

    // Cycle accounting. A cycle runs from one EW green entry to the next.
    phase_elapsed_ms: f64,
    cycle_elapsed_ms: f64,
    cycle_open: bool,
    cycles_completed: u64,
    total_cycle_ms: f64,
    greens_completed: u64,
    total_green_ms: f64,
}

impl fmt::Debug for SignalController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalController")
            .field("phase", &self.phase)
            .field("remaining_ms", &self.remaining_ms)
            .field("timings", &self.timings)
            .field("running", &self.running)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SignalController {
    pub fn new(timings: SignalTimings) -> Self {
        Self {
            phase: Phase::EwGreen,
            remaining_ms: timings.green_ms,
            timings,
            last_served: Axis::Horizontal,
            running: false,
            observers: Vec::new(),
            phase_elapsed_ms: 0.0,
            cycle_elapsed_ms: 0.0,
            cycle_open: false,
            cycles_completed: 0,
            total_cycle_ms: 0.0,
            greens_completed: 0,
            total_green_ms: 0.0,
        }
    }

    /// Enter EW green with its full duration and start consuming time
    pub fn start(&mut self) {
        let from = self.phase;
        self.running = true;
        self.phase = Phase::EwGreen;
        self.last_served = Axis::Horizontal;
        self.remaining_ms = self.timings.green_ms;
        self.phase_elapsed_ms = 0.0;
        self.cycle_elapsed_ms = 0.0;
        self.cycle_open = true;
        self.notify(from);
    }

    /// Freeze the controller; `update` becomes a no-op until `start`
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Consume `elapsed_ms`. Excess time past the end of a phase carries into
    /// the following phase, possibly several phases in one call.
    pub fn update(&mut self, elapsed_ms: f64) {
        if !self.running || !elapsed_ms.is_finite() || elapsed_ms <= 0.0 {
            return;
        }

        let mut left = elapsed_ms;
        while left >= self.remaining_ms {
            left -= self.remaining_ms;
            self.account(self.remaining_ms);
            self.transition(self.natural_successor());
        }
        self.remaining_ms -= left;
        self.account(left);

        debug_assert!(self.remaining_ms >= 0.0);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_ms(&self) -> f64 {
        self.remaining_ms
    }

    /// Whether traffic on `axis` may enter the junction right now
    pub fn is_green(&self, axis: Axis) -> bool {
        self.phase.is_green() && self.phase.axis() == Some(axis)
    }

    pub fn timings(&self) -> SignalTimings {
        self.timings
    }

    /// Apply new durations from the next phase entered onwards. The update is
    /// all-or-nothing: one invalid field keeps every previous value.
    pub fn update_timings(&mut self, update: TimingsUpdate) -> Result<SignalTimings, SimError> {
        let candidate = SignalTimings::new(
            update.green_ms.unwrap_or(self.timings.green_ms),
            update.yellow_ms.unwrap_or(self.timings.yellow_ms),
            update.all_red_ms.unwrap_or(self.timings.all_red_ms),
        )?;
        self.timings = candidate;
        Ok(candidate)
    }

    /// Force `phase` immediately with its full configured duration
    pub fn set_phase(&mut self, phase: Phase) {
        self.transition(phase);
    }

    /// Add `delta_ms` (possibly negative) to the current phase, clamped at zero
    pub fn extend_current_phase(&mut self, delta_ms: f64) {
        if delta_ms.is_finite() {
            self.remaining_ms = (self.remaining_ms + delta_ms).max(0.0);
        }
    }

    /// Skip the rest of the current phase
    pub fn advance_to_next_phase(&mut self) {
        self.transition(self.natural_successor());
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            phase: self.phase,
            remaining_ms: self.remaining_ms,
            timings: self.timings,
        }
    }

    pub fn cycle_statistics(&self) -> CycleStatistics {
        CycleStatistics {
            cycles_completed: self.cycles_completed,
            average_cycle_ms: average(self.total_cycle_ms, self.cycles_completed),
            average_green_ms: average(self.total_green_ms, self.greens_completed),
        }
    }

    /// Observers are called in subscription order on every transition
    pub fn subscribe(&mut self, observer: PhaseObserver) {
        self.observers.push(observer);
    }

    fn natural_successor(&self) -> Phase {
        match self.phase {
            Phase::EwGreen => Phase::EwYellow,
            Phase::NsGreen => Phase::NsYellow,
            Phase::EwYellow | Phase::NsYellow => Phase::AllRed,
            Phase::AllRed => Phase::green_for(self.last_served.other()),
        }
    }

    fn account(&mut self, ms: f64) {
        self.phase_elapsed_ms += ms;
        if self.cycle_open {
            self.cycle_elapsed_ms += ms;
        }
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase;

        if from.is_green() {
            self.greens_completed += 1;
            self.total_green_ms += self.phase_elapsed_ms;
        }
        if to == Phase::EwGreen {
            if self.cycle_open {
                self.cycles_completed += 1;
                self.total_cycle_ms += self.cycle_elapsed_ms;
            }
            self.cycle_open = true;
            self.cycle_elapsed_ms = 0.0;
        }
        if let Some(axis) = to.axis() {
            self.last_served = axis;
        }

        self.phase = to;
        self.remaining_ms = self.timings.duration(to);
        self.phase_elapsed_ms = 0.0;
        self.notify(from);
    }

    fn notify(&mut self, from: Phase) {
        trace!("signal {:?} -> {:?}", from, self.phase);
        let change = PhaseChange {
            from,
            to: self.phase,
            remaining_ms: self.remaining_ms,
        };
        for observer in &mut self.observers {
            observer(&change);
        }
    }
}

fn average(total: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
