//! Publishing of the live schedule status

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::ScheduleStatus;

#[derive(Debug, Default)]
struct Inner {
    latest: Option<ScheduleStatus>,
    subscribers: Vec<Sender<ScheduleStatus>>,
}

/// Latest status plus a fan-out to every subscriber
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: Mutex<Inner>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new status and hand it to every live subscriber.
    /// Subscribers whose receiver has been dropped are forgotten.
    pub fn publish(&self, status: ScheduleStatus) {
        let mut inner = self.lock();
        inner.latest = Some(status);
        inner.subscribers.retain(|tx| tx.send(status).is_ok());
    }

    pub fn latest(&self) -> Option<ScheduleStatus> {
        self.lock().latest
    }

    /// Receive every status published from now on
    pub fn subscribe(&self) -> Receiver<ScheduleStatus> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Drop every subscriber so their receivers disconnect.
    /// Later `subscribe` calls still work.
    pub fn close(&self) {
        self.lock().subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}
