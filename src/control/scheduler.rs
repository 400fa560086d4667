//! The signal cycle
//!
//! Each cycle refreshes the counts and orders the four directions busiest
//! first. Every direction then goes through green, yellow and red.
//! Cancellation is checked at every tick.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::config::TimingConfig;
use super::count_store::CountStore;
use super::error::SignalError;
use super::signal::SignalBoard;
use super::source::CountSampler;
use super::status::StatusBoard;
use super::types::{CountSnapshot, Direction, ScheduleStatus, SignalPhase};

/// Order in which directions are served during one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSequence {
    directions: [Direction; 4],
}

impl CycleSequence {
    /// Busiest direction first; equal counts keep `Direction::ALL` order
    pub fn from_counts(counts: &CountSnapshot) -> Self {
        let mut directions = Direction::ALL;
        // sort_by_key is stable, so ties fall back to declaration order
        directions.sort_by_key(|&d| std::cmp::Reverse(counts.get(d)));
        Self { directions }
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Direction> {
        self.directions.get(index).copied()
    }

    /// The direction served after position `index`, wrapping to the start
    pub fn next_after(&self, index: usize) -> Direction {
        self.directions[(index + 1) % self.directions.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.directions.iter().copied()
    }
}

impl fmt::Display for CycleSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.directions.iter().map(|d| d.name()).collect();
        f.write_str(&names.join(" -> "))
    }
}

/// How a step of the schedule ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Cancelled,
}

/// Counters kept across the cycles of one scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles_completed: u64,
    /// Full green -> yellow -> red sequences, per direction
    served: [u64; 4],
    /// Green ticks served across all directions
    pub green_ticks: u64,
    pub rejected_transitions: u64,
}

impl RunStats {
    pub fn served(&self, direction: Direction) -> u64 {
        self.served[direction.index()]
    }

    pub fn log_summary(&self) {
        info!("=== RUN COMPLETE ===");
        info!("Cycles completed: {}", self.cycles_completed);
        for direction in Direction::ALL {
            info!("Served {}: {}", direction, self.served(direction));
        }
        info!("Green ticks served: {}", self.green_ticks);
        info!("Rejected transitions: {}", self.rejected_transitions);
    }
}

/// Drives the signal board from the count store
pub struct CycleScheduler {
    config: TimingConfig,
    counts: Arc<CountStore>,
    signals: Arc<SignalBoard>,
    status: Arc<StatusBoard>,
    sampler: Box<dyn CountSampler>,
    cycle: u64,
    stats: RunStats,
}

impl CycleScheduler {
    pub fn new(
        config: TimingConfig,
        counts: Arc<CountStore>,
        signals: Arc<SignalBoard>,
        status: Arc<StatusBoard>,
        sampler: Box<dyn CountSampler>,
    ) -> Self {
        Self {
            config,
            counts,
            signals,
            status,
            sampler,
            cycle: 0,
            stats: RunStats::default(),
        }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Index of the next cycle to run
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run cycles until `token` is cancelled.
    /// Every direction is red when this returns.
    pub fn run(&mut self, token: &CancelToken) {
        info!("Scheduler started at cycle {}", self.cycle);
        while self.run_cycle(token) == StepOutcome::Completed {}
        self.signals.force_all_red();
        info!("Scheduler stopped after {} cycles", self.stats.cycles_completed);
    }

    /// Run one full cycle over every direction
    pub fn run_cycle(&mut self, token: &CancelToken) -> StepOutcome {
        if token.is_cancelled() {
            return StepOutcome::Cancelled;
        }

        let Some(snapshot) = self.refresh_counts(token) else {
            return StepOutcome::Cancelled;
        };
        let sequence = CycleSequence::from_counts(&snapshot);
        info!(
            "Cycle {}: counts {} -> order {}",
            self.cycle,
            format_counts(&snapshot),
            sequence
        );

        for (index, direction) in sequence.iter().enumerate() {
            let next = sequence.next_after(index);
            match self.serve(direction, next, token) {
                Ok(StepOutcome::Completed) => {
                    self.stats.served[direction.index()] += 1;
                }
                Ok(StepOutcome::Cancelled) => {
                    self.signals.force_all_red();
                    return StepOutcome::Cancelled;
                }
                Err(err) => {
                    error!("Scheduling fault while serving {}: {}", direction, err);
                    self.stats.rejected_transitions += 1;
                    self.signals.force_all_red();
                    if cfg!(debug_assertions) {
                        panic!("scheduler hit a rejected transition on {}: {}", direction, err);
                    }
                }
            }
        }

        self.stats.cycles_completed += 1;
        self.cycle += 1;
        StepOutcome::Completed
    }

    /// Reset the store, collect this cycle's counts and snapshot them.
    ///
    /// A sampled value wins; otherwise the direction gets whatever a feed
    /// reported since the previous cycle began, or zero if nothing did.
    /// Returns `None` if cancelled while waiting for the live feed.
    fn refresh_counts(&mut self, token: &CancelToken) -> Option<CountSnapshot> {
        let fed = self.counts.take_fed();
        self.counts.reset_all();
        self.sampler.begin_cycle(self.cycle);

        let mut counts = CountSnapshot::default();
        for direction in Direction::ALL {
            let fed = fed[direction.index()];
            let count = match self.sampler.sample(direction) {
                Ok(Some(count)) => Some(count),
                Ok(None) => fed,
                Err(err) => {
                    warn!("No sampled count for {} this cycle: {:#}", direction, err);
                    fed
                }
            };
            counts.set(direction, count.unwrap_or(0));
        }
        self.counts.replace(counts);

        if !self.config.sample_window.is_zero() {
            if token.sleep(self.config.sample_window) {
                return None;
            }
            // Already part of this cycle's snapshot
            self.counts.take_fed();
        }

        Some(self.counts.snapshot())
    }

    /// Walk one direction through green, yellow and red.
    /// Green length follows the live count at the moment it turns green.
    fn serve(
        &mut self,
        direction: Direction,
        next: Direction,
        token: &CancelToken,
    ) -> Result<StepOutcome, SignalError> {
        self.signals.force_red_except(direction);
        self.signals.set_green(direction)?;

        let count = self.counts.count(direction);
        let green = self.config.green_seconds(count);
        debug!("{} green for {} ticks ({} vehicles)", direction, green, count);
        let outcome = self.countdown(direction, next, SignalPhase::Green, green, token);
        if outcome == StepOutcome::Cancelled {
            self.signals.set_red(direction);
            return Ok(StepOutcome::Cancelled);
        }

        self.signals.set_yellow(direction)?;
        let yellow = self.config.yellow;
        let outcome = self.countdown(direction, next, SignalPhase::Yellow, yellow, token);
        self.signals.set_red(direction);
        Ok(outcome)
    }

    /// Publish `ticks` down to 1, sleeping one tick after each.
    /// Only green ticks slept through in full count towards `green_ticks`.
    fn countdown(
        &mut self,
        current: Direction,
        next: Direction,
        phase: SignalPhase,
        ticks: u32,
        token: &CancelToken,
    ) -> StepOutcome {
        for remaining in (1..=ticks).rev() {
            if token.is_cancelled() {
                return StepOutcome::Cancelled;
            }
            self.status.publish(ScheduleStatus {
                current,
                next,
                seconds_remaining: remaining,
                phase,
                cycle: self.cycle,
            });
            if token.sleep(self.config.tick) {
                return StepOutcome::Cancelled;
            }
            if phase == SignalPhase::Green {
                self.stats.green_ticks += 1;
            }
        }
        StepOutcome::Completed
    }
}

fn format_counts(counts: &CountSnapshot) -> String {
    counts
        .iter()
        .map(|(d, c)| format!("{}={}", d, c))
        .collect::<Vec<_>>()
        .join(", ")
}
