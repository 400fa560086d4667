//! Core types for the signal controller
//!
//! Directions, phases, count snapshots and the status view published
//! by the scheduler.

use std::fmt;
use std::str::FromStr;

use super::error::ParseDirectionError;

/// One of the four approaches into the intersection.
///
/// Declaration order is the tie-break used when ordering a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Every direction, in tie-break order
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Position of this direction within `Direction::ALL`
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseDirectionError(s.to_string()))
    }
}

/// Lamp shown by a single direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalPhase {
    #[default]
    Red,
    Yellow,
    Green,
}

impl SignalPhase {
    /// Whether traffic from this direction may enter the intersection
    pub fn is_active(self) -> bool {
        !matches!(self, SignalPhase::Red)
    }
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SignalPhase::Red => "RED",
            SignalPhase::Yellow => "YELLOW",
            SignalPhase::Green => "GREEN",
        };
        f.write_str(label)
    }
}

/// An owned copy of the vehicle count of every direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountSnapshot {
    counts: [u32; 4],
}

impl CountSnapshot {
    /// Build a snapshot from counts given in `Direction::ALL` order
    pub fn new(counts: [u32; 4]) -> Self {
        Self { counts }
    }

    pub fn get(&self, direction: Direction) -> u32 {
        self.counts[direction.index()]
    }

    pub fn set(&mut self, direction: Direction, value: u32) {
        self.counts[direction.index()] = value;
    }

    /// Counts paired with their direction, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (Direction, u32)> + '_ {
        Direction::ALL.into_iter().map(|d| (d, self.get(d)))
    }

    /// Vehicles seen across all directions
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }
}

/// What the scheduler is doing right now.
///
/// Overwritten on every tick; carries no guarantee beyond reflecting the
/// live state at the moment it was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleStatus {
    pub current: Direction,
    pub next: Direction,
    pub seconds_remaining: u32,
    pub phase: SignalPhase,
    /// Zero-based index of the cycle being served
    pub cycle: u64,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} | current: {} ({}) | time left: {}s | next: {}",
            self.cycle,
            self.current.name().to_uppercase(),
            self.phase,
            self.seconds_remaining,
            self.next.name().to_uppercase()
        )
    }
}
