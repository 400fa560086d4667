//! Signal scheduling controller
//!
//! Everything needed to run the lights of one four-way intersection:
//! the shared count store, the per-direction signal state machines, the
//! cycle scheduler and the controller that owns their threads. Count
//! acquisition and rendering stay outside; they plug in through
//! `CountFeed` / `CountSampler` and the status stream.

mod cancel;
mod config;
mod controller;
mod count_store;
mod error;
mod scheduler;
mod signal;
mod source;
mod status;
mod types;

pub use cancel::CancelToken;
pub use config::{
    green_seconds, TimingConfig, GREEN_SECONDS_PER_VEHICLE, MAX_GREEN_SECONDS, MIN_GREEN_SECONDS,
    TICK, YELLOW_SECONDS,
};
pub use controller::Controller;
pub use count_store::CountStore;
pub use error::{ConfigError, ControlError, ParseDirectionError, SignalError};
pub use scheduler::{CycleScheduler, CycleSequence, RunStats, StepOutcome};
pub use signal::{SignalBoard, SignalState};
pub use source::{
    CountFeed, CountSampler, NoSampler, RandomCounts, ScriptedCounts, SimulatedDetector,
    DEFAULT_MAX_RANDOM_COUNT,
};
pub use status::StatusBoard;
pub use types::{CountSnapshot, Direction, ScheduleStatus, SignalPhase};
