use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use traffic_signal::control::{
    Controller, NoSampler, RandomCounts, SimulatedDetector, TimingConfig, DEFAULT_MAX_RANDOM_COUNT,
    GREEN_SECONDS_PER_VEHICLE, MAX_GREEN_SECONDS, MIN_GREEN_SECONDS, YELLOW_SECONDS,
};

#[derive(Parser)]
#[command(name = "traffic_signal")]
#[command(about = "Adaptive signal controller for a four-way intersection")]
struct Cli {
    /// Number of full cycles to run before stopping (0 runs until killed)
    #[arg(long, default_value = "1")]
    cycles: u64,

    /// Length of one countdown tick in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Green ticks granted per counted vehicle
    #[arg(long, default_value_t = GREEN_SECONDS_PER_VEHICLE)]
    green_per_vehicle: u32,

    /// Shortest green interval, in ticks
    #[arg(long, default_value_t = MIN_GREEN_SECONDS)]
    min_green: u32,

    /// Longest green interval, in ticks
    #[arg(long, default_value_t = MAX_GREEN_SECONDS)]
    max_green: u32,

    /// Yellow interval, in ticks
    #[arg(long, default_value_t = YELLOW_SECONDS)]
    yellow: u32,

    /// Seed for the simulated traffic
    #[arg(long)]
    seed: Option<u64>,

    /// Highest simulated count per direction and cycle
    #[arg(long, default_value_t = DEFAULT_MAX_RANDOM_COUNT)]
    max_count: u32,

    /// Take counts from a simulated detector crediting the green direction
    /// instead of drawing random ones
    #[arg(long)]
    detector: bool,
}

impl Cli {
    fn timing(&self) -> TimingConfig {
        TimingConfig {
            tick: Duration::from_millis(self.tick_ms),
            green_per_vehicle: self.green_per_vehicle,
            min_green: self.min_green,
            max_green: self.max_green,
            yellow: self.yellow,
            ..TimingConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut controller = if cli.detector {
        let frame_interval = Duration::from_millis((cli.tick_ms / 30).max(1));
        let seed = cli.seed.unwrap_or_else(rand::random);
        Controller::new(cli.timing(), NoSampler)
            .context("Failed to build controller")?
            .with_feed(SimulatedDetector::new(frame_interval, 1, seed))
    } else {
        let sampler = match cli.seed {
            Some(seed) => RandomCounts::with_seed(cli.max_count, seed),
            None => RandomCounts::new(cli.max_count),
        };
        Controller::new(cli.timing(), sampler).context("Failed to build controller")?
    };

    println!("Running traffic signal controller...");
    println!(
        "Cycles: {}, Tick: {}ms",
        if cli.cycles == 0 {
            "unbounded".to_string()
        } else {
            cli.cycles.to_string()
        },
        cli.tick_ms
    );
    println!();

    let statuses = controller.subscribe();
    controller.start().context("Failed to start controller")?;

    // Ends early if the scheduler thread dies and the board disconnects us
    for status in statuses.iter() {
        if cli.cycles > 0 && status.cycle >= cli.cycles {
            break;
        }
        println!("{}", status);
    }

    controller.stop();

    println!();
    println!("=== Final Signals ===");
    for (direction, phase) in controller.phases() {
        println!("  {:<5}: {}", direction.name().to_uppercase(), phase);
    }
    controller
        .stats()
        .context("Scheduler thread ended abnormally")?
        .log_summary();
    info!("Last counts: total {}", controller.counts().total());
    Ok(())
}
