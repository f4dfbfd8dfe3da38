use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use traffic_grid::simulation::{
    SimConfig, SimulationEngine, ALLRED_MS, GREEN_MS, LANE_CAPACITY, YELLOW_MS,
};

#[derive(Parser)]
#[command(name = "traffic_grid")]
#[command(about = "Signal-controlled grid traffic simulation")]
struct Cli {
    /// Number of junction rows
    #[arg(long, default_value = "3")]
    rows: usize,

    /// Number of junction columns
    #[arg(long, default_value = "3")]
    cols: usize,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Simulated milliseconds per tick
    #[arg(long, default_value = "100")]
    tick_ms: f64,

    /// Try to spawn a vehicle every N ticks
    #[arg(long, default_value = "5")]
    spawn_every: u32,

    /// RNG seed; identical seeds replay identical runs
    #[arg(long, default_value = "42")]
    seed: u64,

    #[arg(long, default_value_t = GREEN_MS)]
    green_ms: f64,

    #[arg(long, default_value_t = YELLOW_MS)]
    yellow_ms: f64,

    #[arg(long, default_value_t = ALLRED_MS)]
    all_red_ms: f64,

    #[arg(long, default_value_t = LANE_CAPACITY)]
    lane_capacity: usize,

    /// Only print the final report
    #[arg(long)]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            green_ms: self.green_ms,
            yellow_ms: self.yellow_ms,
            all_red_ms: self.all_red_ms,
            lane_capacity: self.lane_capacity,
            ..SimConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut engine = SimulationEngine::with_full_grid(cli.rows, cli.cols, cli.config(), cli.seed)
        .context("Failed to build the junction grid")?;

    run_headless(&mut engine, &cli);
    Ok(())
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(engine: &mut SimulationEngine, cli: &Cli) {
    info!(
        "Running {}x{} grid for {} ticks of {}ms",
        cli.rows, cli.cols, cli.ticks, cli.tick_ms
    );

    // Summaries are printed once per simulated second
    let ticks_per_second = (1000.0 / cli.tick_ms).ceil().max(1.0) as u32;
    let spawn_every = cli.spawn_every.max(1);

    if !cli.quiet {
        println!("Initial state:");
        engine.print_summary();
        engine.draw_map();
        println!();
    }

    let mut total_travel_ms = 0.0;
    let mut finished_trips = 0u64;

    for tick in 1..=cli.ticks {
        if tick % spawn_every == 0 {
            if let Err(err) = engine.spawn_vehicle() {
                debug!("Tick {}: no spawn ({})", tick, err);
            }
        }

        engine.update(1.0, cli.tick_ms);

        for (_, trip) in engine.dispose_finished() {
            if let Some(travel_ms) = trip.travel_time_ms() {
                total_travel_ms += travel_ms;
                finished_trips += 1;
            }
        }

        if !cli.quiet && tick % ticks_per_second == 0 {
            println!(
                "--- After tick {} ({:.1}s simulated time) ---",
                tick,
                engine.time_ms() / 1000.0
            );
            engine.print_summary();
            engine.draw_map();
            println!();
        }
    }

    let stats = engine.stats();
    info!("=== SIMULATION COMPLETE ===");
    info!("Elapsed time: {:.2}s", engine.time_ms() / 1000.0);
    info!("Total vehicles spawned: {}", stats.spawned);
    info!("Total vehicles completed: {}", stats.completed);
    info!("Active vehicles: {}", engine.vehicle_count());
    info!("Queued vehicles: {}", engine.total_queued());
    info!("Total junctions: {}", engine.router().junction_count());
    info!("Total roads: {}", engine.router().road_count());
    info!(
        "Average travel time: {:.2}s",
        if finished_trips > 0 {
            total_travel_ms / finished_trips as f64 / 1000.0
        } else {
            0.0
        }
    );
    info!(
        "Success rate: {:.1}%",
        if stats.spawned > 0 {
            (stats.completed as f32 / stats.spawned as f32) * 100.0
        } else {
            0.0
        }
    );
}
