use thiserror::Error;

use super::types::{Direction, SignalPhase};

/// A signal transition the state machine refused to make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("invalid transition for {direction}: {from} -> {to}")]
    InvalidTransition {
        direction: Direction,
        from: SignalPhase,
        to: SignalPhase,
    },

    #[error("cannot turn {requested} green while {active} is not red")]
    ConflictingSignal {
        requested: Direction,
        active: Direction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("minimum green ({min}s) exceeds maximum green ({max}s)")]
    GreenBoundsInverted { min: u32, max: u32 },

    #[error("maximum green must be at least one tick")]
    ZeroMaxGreen,

    #[error("yellow interval must be at least one tick")]
    ZeroYellow,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid timing configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scheduler thread panicked during the previous run; build a new controller")]
    SchedulerLost,

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown direction: {0:?}")]
pub struct ParseDirectionError(pub String);
