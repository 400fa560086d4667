//! Cycle scheduler tests
//!
//! Ticks are zero or a few milliseconds so whole cycles run instantly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use traffic_signal::control::{
    green_seconds, CancelToken, CountSampler, CountSnapshot, CountStore, CycleScheduler,
    CycleSequence, Direction, NoSampler, ScheduleStatus, ScriptedCounts, SignalBoard,
    SignalPhase, StatusBoard, StepOutcome, TimingConfig,
};

struct Fixture {
    scheduler: CycleScheduler,
    counts: Arc<CountStore>,
    signals: Arc<SignalBoard>,
    status: Arc<StatusBoard>,
}

fn fixture(tick: Duration, sampler: impl CountSampler + 'static) -> Fixture {
    let counts = Arc::new(CountStore::new());
    let signals = Arc::new(SignalBoard::new());
    let status = Arc::new(StatusBoard::new());
    let scheduler = CycleScheduler::new(
        TimingConfig::with_tick(tick),
        Arc::clone(&counts),
        Arc::clone(&signals),
        Arc::clone(&status),
        Box::new(sampler),
    );
    Fixture {
        scheduler,
        counts,
        signals,
        status,
    }
}

/// Directions in the order they were first served
fn served_order(statuses: &[ScheduleStatus]) -> Vec<Direction> {
    let mut order: Vec<Direction> = Vec::new();
    for status in statuses {
        if order.last() != Some(&status.current) {
            order.push(status.current);
        }
    }
    order
}

/// Countdown published for one direction and phase
fn countdown(statuses: &[ScheduleStatus], direction: Direction, phase: SignalPhase) -> Vec<u32> {
    statuses
        .iter()
        .filter(|s| s.current == direction && s.phase == phase)
        .map(|s| s.seconds_remaining)
        .collect()
}

#[test]
fn test_green_seconds_boundaries() {
    assert_eq!(green_seconds(0), 10);
    assert_eq!(green_seconds(3), 10);
    assert_eq!(green_seconds(4), 12);
    assert_eq!(green_seconds(10), 30);
    assert_eq!(green_seconds(11), 30);
    assert_eq!(green_seconds(u32::MAX), 30);
}

#[test]
fn test_green_seconds_follow_config() {
    let config = TimingConfig {
        green_per_vehicle: 2,
        min_green: 4,
        max_green: 12,
        ..TimingConfig::default()
    };
    assert_eq!(config.green_seconds(0), 4);
    assert_eq!(config.green_seconds(3), 6);
    assert_eq!(config.green_seconds(100), 12);
}

#[test]
fn test_invalid_config_rejected() {
    let inverted = TimingConfig {
        min_green: 31,
        ..TimingConfig::default()
    };
    assert!(inverted.validate().is_err());

    let no_yellow = TimingConfig {
        yellow: 0,
        ..TimingConfig::default()
    };
    assert!(no_yellow.validate().is_err());

    assert!(TimingConfig::default().validate().is_ok());
}

#[test]
fn test_sequence_busiest_first_with_stable_ties() {
    let counts = CountSnapshot::new([5, 5, 9, 0]);
    let sequence = CycleSequence::from_counts(&counts);
    assert_eq!(
        sequence.directions(),
        &[Direction::East, Direction::North, Direction::South, Direction::West]
    );
}

#[test]
fn test_sequence_all_equal_keeps_declaration_order() {
    let sequence = CycleSequence::from_counts(&CountSnapshot::default());
    assert_eq!(sequence.directions(), &Direction::ALL);
    assert_eq!(sequence.len(), 4);
}

#[test]
fn test_sequence_next_wraps_around() {
    let sequence = CycleSequence::from_counts(&CountSnapshot::new([0, 1, 2, 3]));
    assert_eq!(sequence.get(0), Some(Direction::West));
    assert_eq!(sequence.next_after(0), Direction::East);
    assert_eq!(sequence.next_after(3), Direction::West);
    assert_eq!(sequence.to_string(), "west -> east -> south -> north");
}

#[test]
fn test_one_cycle_serves_every_direction_once() {
    let mut f = fixture(
        Duration::ZERO,
        ScriptedCounts::constant(CountSnapshot::new([5, 5, 9, 0])),
    );
    let rx = f.status.subscribe();

    let outcome = f.scheduler.run_cycle(&CancelToken::new());
    assert_eq!(outcome, StepOutcome::Completed);

    let statuses: Vec<ScheduleStatus> = rx.try_iter().collect();
    assert_eq!(
        served_order(&statuses),
        vec![Direction::East, Direction::North, Direction::South, Direction::West]
    );

    let expected_green: [(Direction, u32); 4] = [
        (Direction::East, 27),
        (Direction::North, 15),
        (Direction::South, 15),
        (Direction::West, 10),
    ];
    for (direction, ticks) in expected_green {
        let green = countdown(&statuses, direction, SignalPhase::Green);
        assert_eq!(green, (1..=ticks).rev().collect::<Vec<u32>>(), "{}", direction);
        let yellow = countdown(&statuses, direction, SignalPhase::Yellow);
        assert_eq!(yellow, vec![3, 2, 1], "{}", direction);
    }

    // Next direction wraps to the head of the sequence
    let last = statuses.last().unwrap();
    assert_eq!(last.current, Direction::West);
    assert_eq!(last.next, Direction::East);
    assert!(statuses.iter().all(|s| s.cycle == 0));

    assert!(f.signals.phases().iter().all(|(_, p)| *p == SignalPhase::Red));
    let stats = f.scheduler.stats();
    assert_eq!(stats.cycles_completed, 1);
    for direction in Direction::ALL {
        assert_eq!(stats.served(direction), 1);
    }
    assert_eq!(stats.green_ticks, 27 + 15 + 15 + 10);
    assert_eq!(stats.rejected_transitions, 0);
}

#[test]
fn test_sequence_recomputed_each_cycle() {
    let mut f = fixture(
        Duration::ZERO,
        ScriptedCounts::new(vec![
            CountSnapshot::new([5, 5, 9, 0]),
            CountSnapshot::new([0, 0, 0, 7]),
        ]),
    );
    let rx = f.status.subscribe();
    let token = CancelToken::new();

    assert_eq!(f.scheduler.run_cycle(&token), StepOutcome::Completed);
    assert_eq!(f.counts.snapshot(), CountSnapshot::new([5, 5, 9, 0]));
    assert_eq!(f.scheduler.run_cycle(&token), StepOutcome::Completed);
    assert_eq!(f.counts.snapshot(), CountSnapshot::new([0, 0, 0, 7]));

    let statuses: Vec<ScheduleStatus> = rx.try_iter().collect();
    let second: Vec<ScheduleStatus> = statuses.iter().copied().filter(|s| s.cycle == 1).collect();
    assert_eq!(
        served_order(&second),
        vec![Direction::West, Direction::North, Direction::South, Direction::East]
    );
    assert_eq!(countdown(&second, Direction::West, SignalPhase::Green).len(), 21);
    assert_eq!(f.scheduler.cycle(), 2);
    for direction in Direction::ALL {
        assert_eq!(f.scheduler.stats().served(direction), 2);
    }
}

struct FailingEast;

impl CountSampler for FailingEast {
    fn sample(&mut self, direction: Direction) -> anyhow::Result<Option<u32>> {
        match direction {
            Direction::East => Err(anyhow!("camera offline")),
            _ => Ok(Some(10)),
        }
    }
}

#[test]
fn test_sampler_error_counts_as_zero() {
    let mut f = fixture(Duration::ZERO, FailingEast);
    let rx = f.status.subscribe();

    assert_eq!(f.scheduler.run_cycle(&CancelToken::new()), StepOutcome::Completed);

    let statuses: Vec<ScheduleStatus> = rx.try_iter().collect();
    assert_eq!(
        served_order(&statuses),
        vec![Direction::North, Direction::South, Direction::West, Direction::East]
    );
    assert_eq!(countdown(&statuses, Direction::East, SignalPhase::Green).len(), 10);
    assert_eq!(countdown(&statuses, Direction::North, SignalPhase::Green).len(), 30);
}

#[test]
fn test_cancelled_token_runs_nothing() {
    let mut f = fixture(Duration::ZERO, ScriptedCounts::constant(CountSnapshot::default()));
    let rx = f.status.subscribe();
    let token = CancelToken::new();
    token.cancel();

    assert_eq!(f.scheduler.run_cycle(&token), StepOutcome::Cancelled);
    assert_eq!(rx.try_iter().count(), 0);
    assert_eq!(f.scheduler.stats().cycles_completed, 0);
}

#[test]
fn test_cancel_during_green_stops_within_a_tick() {
    let tick = Duration::from_millis(200);
    let f = fixture(tick, ScriptedCounts::constant(CountSnapshot::new([10, 0, 0, 0])));
    let rx = f.status.subscribe();
    let signals = Arc::clone(&f.signals);
    let token = CancelToken::new();

    let handle = {
        let token = token.clone();
        let mut scheduler = f.scheduler;
        thread::spawn(move || {
            scheduler.run(&token);
            scheduler
        })
    };

    let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first.current, Direction::North);
    assert_eq!(first.phase, SignalPhase::Green);
    assert_eq!(first.seconds_remaining, 30);

    let cancelled_at = Instant::now();
    token.cancel();
    let scheduler = handle.join().unwrap();
    assert!(cancelled_at.elapsed() < tick);

    assert!(signals.phases().iter().all(|(_, p)| *p == SignalPhase::Red));
    assert_eq!(scheduler.stats().served(Direction::North), 0);
    assert_eq!(scheduler.stats().cycles_completed, 0);
    // The green was cut short, so at most the tick in flight was served
    assert!(scheduler.stats().green_ticks <= 1);
}

#[test]
fn test_at_most_one_direction_active_while_running() {
    let f = fixture(
        Duration::ZERO,
        ScriptedCounts::new(vec![
            CountSnapshot::new([1, 4, 2, 8]),
            CountSnapshot::new([9, 0, 3, 3]),
        ]),
    );
    let signals = Arc::clone(&f.signals);
    let token = CancelToken::new();
    let stop_sampling = Arc::new(AtomicBool::new(false));

    let sampler = {
        let signals = Arc::clone(&signals);
        let stop_sampling = Arc::clone(&stop_sampling);
        thread::spawn(move || {
            let mut samples = 0u64;
            while !stop_sampling.load(Ordering::SeqCst) {
                let active = signals
                    .phases()
                    .iter()
                    .filter(|(_, phase)| phase.is_active())
                    .count();
                assert!(active <= 1, "{} directions active at once", active);
                samples += 1;
            }
            samples
        })
    };

    let mut scheduler = f.scheduler;
    for _ in 0..20 {
        assert_eq!(scheduler.run_cycle(&token), StepOutcome::Completed);
    }
    stop_sampling.store(true, Ordering::SeqCst);

    assert!(sampler.join().unwrap() > 0);
    assert_eq!(scheduler.stats().cycles_completed, 20);
}

#[test]
fn test_fed_counts_order_the_next_cycle_only() {
    let mut f = fixture(Duration::ZERO, NoSampler);
    let rx = f.status.subscribe();
    let token = CancelToken::new();

    f.counts.set_count(Direction::South, 6);
    assert_eq!(f.scheduler.run_cycle(&token), StepOutcome::Completed);
    assert_eq!(f.counts.snapshot(), CountSnapshot::new([0, 6, 0, 0]));

    // Nothing fed during the first cycle, so the second starts from zero
    assert_eq!(f.scheduler.run_cycle(&token), StepOutcome::Completed);
    assert!(f.counts.snapshot().is_zero());

    let statuses: Vec<ScheduleStatus> = rx.try_iter().collect();
    let (first, second): (Vec<ScheduleStatus>, Vec<ScheduleStatus>) =
        statuses.into_iter().partition(|s| s.cycle == 0);
    assert_eq!(served_order(&first)[0], Direction::South);
    assert_eq!(countdown(&first, Direction::South, SignalPhase::Green).len(), 18);
    assert_eq!(served_order(&second)[0], Direction::North);
    assert_eq!(countdown(&second, Direction::South, SignalPhase::Green).len(), 10);
}

#[test]
fn test_sampled_count_overrides_fed_count() {
    let mut f = fixture(
        Duration::ZERO,
        ScriptedCounts::constant(CountSnapshot::new([0, 0, 1, 0])),
    );
    let rx = f.status.subscribe();

    f.counts.set_count(Direction::East, 9);
    f.counts.set_count(Direction::West, 4);
    assert_eq!(f.scheduler.run_cycle(&CancelToken::new()), StepOutcome::Completed);
    assert_eq!(f.counts.snapshot(), CountSnapshot::new([0, 0, 1, 0]));

    let statuses: Vec<ScheduleStatus> = rx.try_iter().collect();
    assert_eq!(
        served_order(&statuses),
        vec![Direction::East, Direction::North, Direction::South, Direction::West]
    );
    assert_eq!(countdown(&statuses, Direction::East, SignalPhase::Green).len(), 10);
}

#[test]
fn test_green_follows_count_fed_mid_cycle() {
    let mut f = fixture(Duration::from_millis(5), NoSampler);
    let rx = f.status.subscribe();
    let started = f.status.subscribe();
    let counts = Arc::clone(&f.counts);

    let feeder = thread::spawn(move || {
        let first = started.recv_timeout(Duration::from_secs(5)).unwrap();
        counts.set_count(Direction::West, 8);
        first
    });

    assert_eq!(f.scheduler.run_cycle(&CancelToken::new()), StepOutcome::Completed);
    assert_eq!(feeder.join().unwrap().current, Direction::North);

    // West was already last in the order but turns green with the fed count
    let statuses: Vec<ScheduleStatus> = rx.try_iter().collect();
    assert_eq!(served_order(&statuses).last(), Some(&Direction::West));
    assert_eq!(countdown(&statuses, Direction::West, SignalPhase::Green).len(), 24);
    assert_eq!(f.scheduler.stats().green_ticks, 10 + 10 + 10 + 24);
}

/// Turns North red behind the scheduler's back once its green has started
fn interfere_with_north(f: &Fixture) -> thread::JoinHandle<()> {
    let started = f.status.subscribe();
    let signals = Arc::clone(&f.signals);
    thread::spawn(move || {
        started.recv_timeout(Duration::from_secs(5)).unwrap();
        signals.set_red(Direction::North);
    })
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "rejected transition")]
fn test_rejected_transition_panics_in_debug_builds() {
    let mut f = fixture(Duration::from_millis(20), NoSampler);
    let _interferer = interfere_with_north(&f);
    f.scheduler.run_cycle(&CancelToken::new());
}

#[test]
#[cfg(not(debug_assertions))]
fn test_rejected_transition_forces_red_in_release_builds() {
    let mut f = fixture(Duration::from_millis(20), NoSampler);
    let interferer = interfere_with_north(&f);

    assert_eq!(f.scheduler.run_cycle(&CancelToken::new()), StepOutcome::Completed);
    interferer.join().unwrap();

    let stats = f.scheduler.stats();
    assert_eq!(stats.rejected_transitions, 1);
    assert_eq!(stats.served(Direction::North), 0);
    assert_eq!(stats.served(Direction::West), 1);
    assert!(f.signals.phases().iter().all(|(_, p)| *p == SignalPhase::Red));
}
