//! Lifecycle of a controller run
//!
//! `start` spawns the scheduler thread and, when a feed is attached, a
//! second thread pumping it. `stop` cancels both and waits for them; the
//! scheduler notices within one tick.
//!
//! The scheduler and feed only move onto their threads once the spawn has
//! succeeded, so a failed `start` leaves both parked for the next attempt.

use std::io;
use std::sync::mpsc::{self, Receiver, SendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::config::TimingConfig;
use super::count_store::CountStore;
use super::error::ControlError;
use super::scheduler::{CycleScheduler, RunStats};
use super::signal::SignalBoard;
use super::source::{CountFeed, CountSampler};
use super::status::StatusBoard;
use super::types::{CountSnapshot, Direction, ScheduleStatus, SignalPhase};

/// Pause after a failed pump before reading the feed again
const FEED_RETRY_DELAY: Duration = Duration::from_millis(100);

struct ActiveRun {
    token: CancelToken,
    scheduler: JoinHandle<Option<CycleScheduler>>,
    feed: Option<JoinHandle<Option<Box<dyn CountFeed>>>>,
}

/// Disconnects status subscribers if the scheduler thread unwinds
struct CloseOnPanic(Arc<StatusBoard>);

impl Drop for CloseOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.close();
        }
    }
}

/// Owns the intersection: its counts, its signals and the threads that
/// drive them.
pub struct Controller {
    counts: Arc<CountStore>,
    signals: Arc<SignalBoard>,
    status: Arc<StatusBoard>,
    /// Parked here between runs; moved onto its thread while running
    scheduler: Option<CycleScheduler>,
    feed: Option<Box<dyn CountFeed>>,
    run: Option<ActiveRun>,
    last_stats: Option<RunStats>,
}

impl Controller {
    pub fn new(
        config: TimingConfig,
        sampler: impl CountSampler + 'static,
    ) -> Result<Self, ControlError> {
        config.validate()?;

        let counts = Arc::new(CountStore::new());
        let signals = Arc::new(SignalBoard::new());
        let status = Arc::new(StatusBoard::new());
        let scheduler = CycleScheduler::new(
            config,
            Arc::clone(&counts),
            Arc::clone(&signals),
            Arc::clone(&status),
            Box::new(sampler),
        );

        Ok(Self {
            counts,
            signals,
            status,
            scheduler: Some(scheduler),
            feed: None,
            run: None,
            last_stats: None,
        })
    }

    /// Attach a live count feed, pumped on its own thread while running
    pub fn with_feed(mut self, feed: impl CountFeed + 'static) -> Self {
        self.feed = Some(Box::new(feed));
        self
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Start cycling the signals. Does nothing if already running.
    pub fn start(&mut self) -> Result<(), ControlError> {
        if self.run.is_some() {
            debug!("Controller already running, start ignored");
            return Ok(());
        }
        let scheduler = self.scheduler.take().ok_or(ControlError::SchedulerLost)?;
        let token = CancelToken::new();

        let feed = match self.feed.take() {
            Some(feed) => match self.spawn_feed(feed, &token) {
                Ok(handle) => handle,
                Err(err) => {
                    self.scheduler = Some(scheduler);
                    return Err(err);
                }
            },
            None => None,
        };

        let run_token = token.clone();
        let status = Arc::clone(&self.status);
        let body = move |mut scheduler: CycleScheduler| {
            let _close = CloseOnPanic(status);
            scheduler.run(&run_token);
            scheduler
        };
        let scheduler = match spawn_with("signal-scheduler", scheduler, body) {
            Ok(handle) => handle,
            Err((scheduler, source)) => {
                token.cancel();
                self.scheduler = Some(scheduler);
                if let Some(handle) = feed {
                    self.reclaim_feed(handle);
                }
                return Err(ControlError::Spawn {
                    name: "scheduler",
                    source,
                });
            }
        };

        self.run = Some(ActiveRun {
            token,
            scheduler,
            feed,
        });
        info!("Controller started");
        Ok(())
    }

    /// Acquire the feed and start pumping it.
    /// A feed that cannot be acquired is kept for the next start and the run
    /// goes ahead without it. A feed whose thread cannot be spawned is
    /// released and kept.
    fn spawn_feed(
        &mut self,
        mut feed: Box<dyn CountFeed>,
        token: &CancelToken,
    ) -> Result<Option<JoinHandle<Option<Box<dyn CountFeed>>>>, ControlError> {
        if let Err(err) = feed.acquire() {
            warn!("Count feed unavailable, running without it: {:#}", err);
            self.feed = Some(feed);
            return Ok(None);
        }

        let counts = Arc::clone(&self.counts);
        let signals = Arc::clone(&self.signals);
        let token = token.clone();
        let body = move |feed: Box<dyn CountFeed>| pump_feed(feed, &counts, &signals, &token);
        match spawn_with("count-feed", feed, body) {
            Ok(handle) => Ok(Some(handle)),
            Err((mut feed, source)) => {
                feed.release();
                self.feed = Some(feed);
                Err(ControlError::Spawn {
                    name: "count feed",
                    source,
                })
            }
        }
    }

    fn reclaim_feed(&mut self, handle: JoinHandle<Option<Box<dyn CountFeed>>>) {
        match handle.join() {
            Ok(Some(feed)) => self.feed = Some(feed),
            Ok(None) | Err(_) => error!("Count feed thread ended abnormally; feed dropped"),
        }
    }

    /// Stop cycling and wait for the background threads to finish.
    /// Every direction is red afterwards. Does nothing if not running.
    pub fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            debug!("Controller not running, stop ignored");
            return;
        };
        run.token.cancel();

        if let Some(handle) = run.feed {
            self.reclaim_feed(handle);
        }
        match run.scheduler.join() {
            Ok(Some(scheduler)) => {
                self.last_stats = Some(scheduler.stats().clone());
                self.scheduler = Some(scheduler);
            }
            Ok(None) | Err(_) => {
                error!("Scheduler thread ended abnormally; controller cannot be restarted")
            }
        }

        self.signals.force_all_red();
        info!("Controller stopped");
    }

    /// Push a fresh count for a direction
    pub fn provide_count(&self, direction: Direction, value: i64) {
        self.counts.set_count(direction, value);
    }

    /// Shared handle to the count store, for feeds running on their own threads
    pub fn count_store(&self) -> Arc<CountStore> {
        Arc::clone(&self.counts)
    }

    pub fn counts(&self) -> CountSnapshot {
        self.counts.snapshot()
    }

    pub fn phase(&self, direction: Direction) -> SignalPhase {
        self.signals.phase(direction)
    }

    pub fn phases(&self) -> [(Direction, SignalPhase); 4] {
        self.signals.phases()
    }

    /// Latest published status, if any tick has run yet
    pub fn status(&self) -> Option<ScheduleStatus> {
        self.status.latest()
    }

    pub fn subscribe(&self) -> Receiver<ScheduleStatus> {
        self.status.subscribe()
    }

    /// Statistics of the scheduler as of the last `stop`
    pub fn stats(&self) -> Option<&RunStats> {
        self.last_stats.as_ref()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a named thread and hand it `value` once the spawn has succeeded.
/// On failure `value` comes back alongside the error.
fn spawn_with<T, R>(
    name: &str,
    value: T,
    body: impl FnOnce(T) -> R + Send + 'static,
) -> Result<JoinHandle<Option<R>>, (T, io::Error)>
where
    T: Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = mpsc::channel::<T>();
    let spawned = thread::Builder::new()
        .name(name.into())
        .spawn(move || rx.recv().ok().map(body));
    let handle = match spawned {
        Ok(handle) => handle,
        Err(err) => return Err((value, err)),
    };
    match tx.send(value) {
        Ok(()) => Ok(handle),
        Err(SendError(value)) => {
            Err((value, io::Error::other("thread exited before hand-over")))
        }
    }
}

fn pump_feed(
    mut feed: Box<dyn CountFeed>,
    counts: &CountStore,
    signals: &SignalBoard,
    token: &CancelToken,
) -> Box<dyn CountFeed> {
    while !token.is_cancelled() {
        if let Err(err) = feed.pump(counts, signals.active()) {
            warn!("Count feed read failed: {:#}", err);
            if token.sleep(FEED_RETRY_DELAY) {
                break;
            }
        }
    }
    feed.release();
    feed
}
