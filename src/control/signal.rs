//! Signal state machines
//!
//! A `SignalState` holds the lamp of one direction and only changes when
//! told to. `SignalBoard` groups the four of them behind a single lock so
//! that "at most one direction is not red" is checked and observed
//! atomically.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use super::error::SignalError;
use super::types::{Direction, SignalPhase};

/// The lamp of a single direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalState {
    pub direction: Direction,
    phase: SignalPhase,
}

impl SignalState {
    /// Create a signal showing red
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            phase: SignalPhase::Red,
        }
    }

    pub fn phase(&self) -> SignalPhase {
        self.phase
    }

    /// RED -> GREEN. Says nothing about the other directions; the board
    /// checks those.
    pub fn set_green(&mut self) -> Result<(), SignalError> {
        match self.phase {
            SignalPhase::Red => {
                self.enter(SignalPhase::Green);
                Ok(())
            }
            from => Err(self.rejected(from, SignalPhase::Green)),
        }
    }

    /// GREEN -> YELLOW
    pub fn set_yellow(&mut self) -> Result<(), SignalError> {
        match self.phase {
            SignalPhase::Green => {
                self.enter(SignalPhase::Yellow);
                Ok(())
            }
            from => Err(self.rejected(from, SignalPhase::Yellow)),
        }
    }

    /// Any phase -> RED. Never fails; red is always safe.
    pub fn set_red(&mut self) {
        if self.phase != SignalPhase::Red {
            self.enter(SignalPhase::Red);
        }
    }

    fn enter(&mut self, to: SignalPhase) {
        debug!("{}: {} -> {}", self.direction, self.phase, to);
        self.phase = to;
    }

    fn rejected(&self, from: SignalPhase, to: SignalPhase) -> SignalError {
        SignalError::InvalidTransition {
            direction: self.direction,
            from,
            to,
        }
    }
}

/// All four signals of the intersection
#[derive(Debug)]
pub struct SignalBoard {
    signals: Mutex<[SignalState; 4]>,
}

impl Default for SignalBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBoard {
    /// Create a board with every direction red
    pub fn new() -> Self {
        Self {
            signals: Mutex::new(Direction::ALL.map(SignalState::new)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, [SignalState; 4]> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self, direction: Direction) -> SignalPhase {
        self.lock()[direction.index()].phase()
    }

    /// Phase of every direction, taken under one lock
    pub fn phases(&self) -> [(Direction, SignalPhase); 4] {
        let signals = self.lock();
        Direction::ALL.map(|d| (d, signals[d.index()].phase()))
    }

    /// The direction currently showing green or yellow, if any
    pub fn active(&self) -> Option<Direction> {
        self.lock()
            .iter()
            .find(|s| s.phase().is_active())
            .map(|s| s.direction)
    }

    /// Turn a direction green, refusing if any other direction is not red
    pub fn set_green(&self, direction: Direction) -> Result<(), SignalError> {
        let mut signals = self.lock();
        if let Some(other) = signals
            .iter()
            .find(|s| s.direction != direction && s.phase().is_active())
        {
            return Err(SignalError::ConflictingSignal {
                requested: direction,
                active: other.direction,
            });
        }
        signals[direction.index()].set_green()
    }

    pub fn set_yellow(&self, direction: Direction) -> Result<(), SignalError> {
        self.lock()[direction.index()].set_yellow()
    }

    pub fn set_red(&self, direction: Direction) {
        self.lock()[direction.index()].set_red();
    }

    /// Force every direction except `keep` to red
    pub fn force_red_except(&self, keep: Direction) {
        for signal in self.lock().iter_mut().filter(|s| s.direction != keep) {
            signal.set_red();
        }
    }

    pub fn force_all_red(&self) {
        for signal in self.lock().iter_mut() {
            signal.set_red();
        }
    }
}
