//! Proctorstar Deterministic Simulator CLI.
//!
//! Runs synthetic interview sessions through the escalation engine:
//! - Fuzzing: Run many simulations with randomized behaviour and thresholds.
//! - Replay: Re-run a simulation with a specific seed.

use chrono::Local;
use clap::Parser;
use proctorstar::ProctorConfig;
use proctorstar_sim::{ProctorSimulator, SimConfig, SimError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Proctorstar Deterministic Simulator", long_about = None)]
struct CliArgs {
    /// Run mode: fuzz or replay.
    #[arg(value_enum)]
    mode: RunMode,

    /// Seed for the simulation. Required for 'replay', used as master seed for 'fuzz' if provided.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of iterations (distinct SimConfig seeds) for 'fuzz' mode.
    #[arg(short = 'i', long, default_value_t = 1000)]
    iterations: usize,

    /// Simulated session length in seconds.
    #[arg(short = 'd', long, default_value_t = 600)]
    duration_secs: u64,

    /// Upper bound for each behaviour's start probability in fuzz mode.
    #[arg(long, default_value_t = 0.2)]
    max_misbehaviour: f64,

    /// Output file for logging failures.
    #[arg(short = 'o', long, default_value = "proctor_sim_failures.log")]
    output_file: PathBuf,

    /// Number of parallel workers for fuzzing. Defaults to number of logical CPUs.
    #[arg(short = 'w', long, default_value_t = num_cpus::get())]
    workers: usize,

    /// Emit per-tick tracing output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RunMode {
    /// Fuzz with many random configurations.
    Fuzz,
    /// Replay a simulation with a specific seed.
    Replay,
}

fn main() {
    let args = CliArgs::parse();

    let level = if args.verbose { Level::TRACE } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {e}");
    }

    match args.mode {
        RunMode::Fuzz => run_fuzz_mode(args),
        RunMode::Replay => run_replay_mode(args),
    }
}

/// Generates a randomized `SimConfig` for a fuzzing iteration.
///
/// Behaviour probabilities are drawn up to `max_misbehaviour`, and the
/// escalation thresholds are perturbed so the invariants are exercised
/// beyond the production defaults.
///
/// # Configuration Randomization
/// - **Behaviour**: 30% chance each behaviour is disabled, otherwise up to `max_misbehaviour`
/// - **Persistence**: Between 0.3 and 0.95
/// - **Warnings**: 1 to 4 before a strike is requested
/// - **Strikes**: 1 to 5 before termination
/// - **Cooldown**: 2 to 20 seconds
fn generate_fuzz_config(iteration_seed: u64, duration: Duration, max_misbehaviour: f64) -> SimConfig {
    let mut rng = StdRng::seed_from_u64(iteration_seed);
    let max = max_misbehaviour.clamp(0.0, 1.0);
    let behaviour = |rng: &mut StdRng| {
        if rng.random_bool(0.3) || max <= 0.0 {
            0.0
        } else {
            rng.random_range(0.0..=max)
        }
    };

    let mut proctor = ProctorConfig::default();
    proctor.escalation.max_warnings = rng.random_range(1..=4);
    proctor.escalation.max_strikes = rng.random_range(1..=5);
    proctor.escalation.strike_cooldown = Duration::from_millis(rng.random_range(2_000..=20_000));

    SimConfig {
        seed: rng.random(),
        duration,
        slouch_probability: behaviour(&mut rng),
        severe_share: rng.random_range(0.0..=1.0),
        undetected_probability: behaviour(&mut rng),
        look_away_probability: behaviour(&mut rng),
        face_absent_probability: behaviour(&mut rng),
        phone_probability: behaviour(&mut rng),
        browser_event_probability: behaviour(&mut rng) / 4.0,
        persistence: rng.random_range(0.3..=0.95),
        proctor,
    }
}

/// Runs many randomized simulations in parallel.
///
/// Seeds are drawn from the master seed up front, so the set of scenarios is
/// reproducible regardless of worker scheduling. Every invariant violation is
/// logged with its seed and config; the process exits with status 1 if any
/// were found.
fn run_fuzz_mode(args: CliArgs) {
    let duration = Duration::from_secs(args.duration_secs);
    println!(
        "Starting Fuzz mode: {} iterations, {}s sessions, up to {}% misbehaviour, {} workers.",
        args.iterations,
        args.duration_secs,
        (args.max_misbehaviour * 100.0) as u32,
        args.workers
    );
    let fuzz_run_start_time = Instant::now();

    let output_file = match File::create(&args.output_file) {
        Ok(file) => Mutex::new(file),
        Err(e) => {
            eprintln!(
                "Failed to create output file {}: {e}",
                args.output_file.display()
            );
            std::process::exit(2);
        }
    };

    let master_fuzz_seed = args.seed.unwrap_or_else(rand::random);
    println!("Master seed for generating SimConfig seeds: {master_fuzz_seed}");
    let mut seed_rng = StdRng::seed_from_u64(master_fuzz_seed);
    let seeds: Vec<u64> = (0..args.iterations).map(|_| seed_rng.random()).collect();

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers.max(1))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to build worker pool: {e}");
            std::process::exit(2);
        }
    };

    let completed = AtomicUsize::new(0);
    let failures = AtomicUsize::new(0);
    let terminated_sessions = AtomicUsize::new(0);
    let progress_step = (args.iterations / 10).max(1);

    pool.install(|| {
        seeds.par_iter().for_each(|&config_seed| {
            let config = generate_fuzz_config(config_seed, duration, args.max_misbehaviour);
            match run_simulation(config.clone()) {
                Ok(report) => {
                    if report.terminated_by.is_some() {
                        terminated_sessions.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(sim_error) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    let log_message = format!(
                        "[{}] FAILURE - Seed {}: Error: {:?}\nConfig: {:#?}\n\n",
                        Local::now().format("%Y-%m-%d %H:%M:%S"),
                        config_seed,
                        sim_error,
                        config
                    );
                    eprint!("{log_message}");
                    if let Ok(mut file) = output_file.lock() {
                        let _ = file.write_all(log_message.as_bytes());
                        let _ = file.flush();
                    }
                }
            }

            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % progress_step == 0 || done == args.iterations {
                println!(
                    "Progress: {}/{} iterations completed ({} failures)",
                    done,
                    args.iterations,
                    failures.load(Ordering::Relaxed)
                );
            }
        });
    });

    let final_failures = failures.load(Ordering::SeqCst);
    println!("\n--- Fuzzing Run Summary ---");
    println!(
        "Total iterations completed: {}",
        completed.load(Ordering::SeqCst)
    );
    println!("Duration: {:.2?}", fuzz_run_start_time.elapsed());
    println!(
        "Sessions terminated by strikes: {}",
        terminated_sessions.load(Ordering::SeqCst)
    );
    println!("Invariant failures: {final_failures}");
    if final_failures > 0 {
        println!(
            "FAIL: Invariant failures found. Check '{}'.",
            args.output_file.display()
        );
        std::process::exit(1);
    } else {
        println!("PASS: No invariant failures detected.");
    }
}

/// Re-runs a single scenario from its seed and prints the report.
fn run_replay_mode(args: CliArgs) {
    let Some(seed_to_replay) = args.seed else {
        eprintln!("Seed (--seed <VALUE>) is required for replay mode.");
        std::process::exit(2);
    };
    println!("Replaying simulation with SimConfig seed: {seed_to_replay}");

    let config = generate_fuzz_config(
        seed_to_replay,
        Duration::from_secs(args.duration_secs),
        args.max_misbehaviour,
    );
    println!("Replaying with Config: {config:#?}");

    match run_simulation(config) {
        Ok(report) => {
            println!("SUCCESS: Replay of seed {seed_to_replay} completed without errors.");
            println!("Report: {report:#?}");
        }
        Err(e) => {
            eprintln!("FAILURE: Replay of seed {seed_to_replay} resulted in error: {e:?}");
            std::process::exit(1);
        }
    }
}

fn run_simulation(config: SimConfig) -> Result<proctorstar_sim::SimReport, SimError> {
    ProctorSimulator::new(config)?.run()
}
