//! Vehicle count sources
//!
//! Two kinds of collaborator write into the `CountStore`:
//!
//! * a `CountSampler` is asked by the scheduler, right after the per-cycle
//!   reset, for one count per direction. It stands in for a live pipeline
//!   when there is none (random traffic, or a scripted sequence in tests).
//! * a `CountFeed` runs on its own thread for the whole run and pushes
//!   readings whenever it has them, like a detector reading video frames.

use std::time::Duration;

use anyhow::Result;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::count_store::CountStore;
use super::types::{CountSnapshot, Direction};

/// Highest count the random sampler produces by default
pub const DEFAULT_MAX_RANDOM_COUNT: u32 = 10;

/// Produces the counts used to order a cycle.
pub trait CountSampler: Send {
    /// Called once after the store is reset, before any `sample`.
    fn begin_cycle(&mut self, _cycle: u64) {}

    /// Count for `direction` this cycle. On `Ok(None)` or an error the
    /// direction gets what a feed reported since the last cycle began, or 0.
    fn sample(&mut self, direction: Direction) -> Result<Option<u32>>;
}

/// Leaves every count to the live feed
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSampler;

impl CountSampler for NoSampler {
    fn sample(&mut self, _direction: Direction) -> Result<Option<u32>> {
        Ok(None)
    }
}

/// Uniform random traffic in `0..=max`, optionally seeded
#[derive(Debug)]
pub struct RandomCounts {
    max: u32,
    rng: Option<StdRng>,
}

impl RandomCounts {
    pub fn new(max: u32) -> Self {
        Self { max, rng: None }
    }

    /// Create a seeded sampler for reproducible runs
    pub fn with_seed(max: u32, seed: u64) -> Self {
        Self {
            max,
            rng: Some(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomCounts {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RANDOM_COUNT)
    }
}

impl CountSampler for RandomCounts {
    fn sample(&mut self, _direction: Direction) -> Result<Option<u32>> {
        let range = 0..=self.max;
        let count = match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        };
        Ok(Some(count))
    }
}

/// Replays a fixed list of per-cycle counts, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedCounts {
    cycles: Vec<CountSnapshot>,
    current: Option<CountSnapshot>,
}

impl ScriptedCounts {
    pub fn new(cycles: Vec<CountSnapshot>) -> Self {
        Self {
            cycles,
            current: None,
        }
    }

    /// Same counts every cycle
    pub fn constant(counts: CountSnapshot) -> Self {
        Self::new(vec![counts])
    }
}

impl CountSampler for ScriptedCounts {
    fn begin_cycle(&mut self, cycle: u64) {
        self.current = match self.cycles.len() {
            0 => None,
            len => Some(self.cycles[(cycle % len as u64) as usize]),
        };
    }

    fn sample(&mut self, direction: Direction) -> Result<Option<u32>> {
        Ok(self.current.map(|counts| counts.get(direction)))
    }
}

/// A live count pipeline driven on the controller's feed thread.
pub trait CountFeed: Send {
    /// Open whatever the feed reads from. Called on every `start`.
    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    /// Read once and push any fresh values into `counts`.
    ///
    /// `current` is the direction being served, if any. A pump must return
    /// in bounded time; cancellation is only checked between pumps.
    fn pump(&mut self, counts: &CountStore, current: Option<Direction>) -> Result<()>;

    /// Close the source. Called when the feed thread exits.
    fn release(&mut self) {}
}

/// Simulated detector: every frame it spots up to `max_per_frame` vehicles
/// and credits them to the direction being served.
#[derive(Debug)]
pub struct SimulatedDetector {
    frame_interval: Duration,
    max_per_frame: u32,
    rng: StdRng,
    frames: u64,
    detected: u64,
}

impl SimulatedDetector {
    pub fn new(frame_interval: Duration, max_per_frame: u32, seed: u64) -> Self {
        Self {
            frame_interval,
            max_per_frame,
            rng: StdRng::seed_from_u64(seed),
            frames: 0,
            detected: 0,
        }
    }

    /// Total vehicles detected since creation
    pub fn detected(&self) -> u64 {
        self.detected
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl CountFeed for SimulatedDetector {
    fn acquire(&mut self) -> Result<()> {
        info!("Simulated detector opened");
        Ok(())
    }

    fn pump(&mut self, counts: &CountStore, current: Option<Direction>) -> Result<()> {
        std::thread::sleep(self.frame_interval);
        self.frames += 1;
        let Some(direction) = current else {
            return Ok(());
        };
        let seen = self.rng.random_range(0..=self.max_per_frame);
        if seen > 0 {
            counts.add_count(direction, seen);
            self.detected += u64::from(seen);
        }
        Ok(())
    }

    fn release(&mut self) {
        info!(
            "Simulated detector released after {} frames, {} vehicles detected",
            self.frames,
            self.detected
        );
    }
}
