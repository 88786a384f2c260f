use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flocksim::{FlockSimulation, ForceMethod, PanelSettings, SimulationParameters, TickClock};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "flocksim")]
#[command(about = "Headless boid flocking simulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Legacy,
    Modern,
}

impl From<MethodArg> for ForceMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Legacy => ForceMethod::Legacy,
            MethodArg::Modern => ForceMethod::Modern,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation for a number of ticks
    Run {
        /// Control-panel settings file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(long, default_value_t = 600)]
        ticks: u64,

        /// Flock size, overriding the settings file
        #[arg(long)]
        density: Option<usize>,

        /// Random seed for spawning (default: derived from the clock)
        #[arg(long)]
        seed: Option<u64>,

        /// Force formulation, overriding the settings file
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Seconds per tick (default: 1/60)
        #[arg(long)]
        dt: Option<f32>,

        /// Log a summary every N ticks (0 disables)
        #[arg(long, default_value_t = 60)]
        report_every: u64,

        /// Pace ticks against the wall clock instead of running flat out
        #[arg(long)]
        realtime: bool,
    },
    /// Print the default control-panel settings as JSON
    DumpDefaultConfig,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

#[allow(clippy::too_many_arguments)]
fn run(
    config: Option<PathBuf>,
    ticks: u64,
    density: Option<usize>,
    seed: Option<u64>,
    method: Option<MethodArg>,
    dt: Option<f32>,
    report_every: u64,
    realtime: bool,
) -> Result<()> {
    let mut panel = match &config {
        Some(path) => PanelSettings::from_json_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => PanelSettings::default(),
    };
    if let Some(density) = density {
        panel.flock_density = u32::try_from(density).context("Density does not fit in u32")?;
    }
    if let Some(method) = method {
        panel.method = method.into();
    }

    let mut clock = TickClock::default();
    let dt = dt.unwrap_or_else(|| clock.fixed_delta());
    if !dt.is_finite() || dt <= 0.0 {
        bail!("--dt must be a positive number, got {dt}");
    }

    let seed = seed.unwrap_or_else(clock_seed);
    let mut sim = FlockSimulation::builder()
        .with_seed(seed)
        .with_method(panel.method)
        .with_density(panel.density())
        .with_parameters(panel.parameters(&SimulationParameters::default())?)
        .build()
        .context("Failed to build simulation")?;
    sim.apply_panel(&panel).context("Invalid settings")?;

    tracing::info!(
        agents = sim.len(),
        seed,
        method = %sim.method(),
        dt,
        ticks,
        "starting simulation"
    );

    let started = Instant::now();
    let mut last = Instant::now();
    while sim.tick() < ticks {
        let due = if realtime {
            let now = Instant::now();
            let due = clock.advance(now - last);
            last = now;
            if due == 0 {
                std::thread::sleep(Duration::from_millis(1));
                continue;
            }
            due as u64
        } else {
            1
        };

        for _ in 0..due.min(ticks - sim.tick()) {
            let report = sim.step(dt)?;
            if report_every > 0 && report.tick % report_every == 0 {
                let timings = sim.timings();
                tracing::info!(
                    tick = report.tick,
                    agents = report.agents,
                    colliding = report.colliding,
                    corrected = report.corrected,
                    avg_us = timings.average().unwrap_or_default().as_micros() as u64,
                    max_us = timings.max().unwrap_or_default().as_micros() as u64,
                    "progress"
                );
            }
        }
    }

    let total = started.elapsed();
    let timings = sim.timings();
    println!("Ticks:        {}", sim.tick());
    println!("Agents:       {}", sim.len());
    println!("Wall time:    {:.2?}", total);
    if let (Some(avg), Some(min), Some(max)) = (timings.average(), timings.min(), timings.max()) {
        println!("Step avg:     {:.2?} (min {:.2?}, max {:.2?})", avg, min, max);
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            density,
            seed,
            method,
            dt,
            report_every,
            realtime,
        } => run(config, ticks, density, seed, method, dt, report_every, realtime),
        Commands::DumpDefaultConfig => {
            println!("{}", PanelSettings::default().to_json_string()?);
            Ok(())
        }
    }
}
