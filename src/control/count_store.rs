//! Vehicle counts shared between the detection feed and the scheduler

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::{CountSnapshot, Direction};

#[derive(Debug, Default)]
struct Table {
    current: CountSnapshot,
    /// What feeds wrote per direction since the last `take_fed`
    fed: [Option<u32>; 4],
}

/// Current vehicle count per direction.
///
/// The whole table sits behind one lock: a reader sees either the state
/// before a `reset_all` or the state after it, never a mix.
///
/// Writes through `set_count` and `add_count` are also remembered as fed
/// data until the scheduler collects them with `take_fed`, so a reset at the
/// start of a cycle does not lose what a feed reported during the last one.
#[derive(Debug, Default)]
pub struct CountStore {
    table: Mutex<Table>,
}

impl CountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the count for a direction.
    /// Negative values clamp to zero, oversized values saturate.
    pub fn set_count(&self, direction: Direction, value: i64) {
        let value = u32::try_from(value.max(0)).unwrap_or(u32::MAX);
        let mut table = self.lock();
        table.current.set(direction, value);
        table.fed[direction.index()] = Some(value);
    }

    /// Credit `delta` more vehicles to a direction
    pub fn add_count(&self, direction: Direction, delta: u32) {
        let mut table = self.lock();
        let value = table.current.get(direction).saturating_add(delta);
        table.current.set(direction, value);
        let fed = &mut table.fed[direction.index()];
        *fed = Some(fed.unwrap_or(0).saturating_add(delta));
    }

    pub fn count(&self, direction: Direction) -> u32 {
        self.lock().current.get(direction)
    }

    /// Count for a direction given by name; unknown names read as zero
    pub fn count_named(&self, name: &str) -> u32 {
        name.parse::<Direction>()
            .map(|direction| self.count(direction))
            .unwrap_or(0)
    }

    /// Overwrite every direction at once. Not recorded as fed data.
    pub fn replace(&self, counts: CountSnapshot) {
        self.lock().current = counts;
    }

    /// Zero every direction. Fed data waiting for `take_fed` is kept.
    pub fn reset_all(&self) {
        self.lock().current = CountSnapshot::default();
    }

    pub fn snapshot(&self) -> CountSnapshot {
        self.lock().current
    }

    /// Fed data per direction since the previous call, in `Direction::ALL`
    /// order. `None` means no feed reported that direction.
    pub fn take_fed(&self) -> [Option<u32>; 4] {
        std::mem::take(&mut self.lock().fed)
    }
}
