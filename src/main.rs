//! CLI entry point for the gacha simulator

use clap::{Parser, ValueEnum};
use gacha_sim::{
    config::SimulationConfig,
    simulation::{fresh_seed, run_trials},
    stats::{AggregatedStats, OutcomeRecord, Summary},
};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "gacha-sim")]
#[command(version = "0.3")]
#[command(about = "Monte Carlo simulator for a character pool and its dependent weapon pool", long_about = None)]
struct Args {
    /// Path to the scenario file (YAML or JSON). Built-in rules are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trials to run (defaults to the scenario's simulation_runs)
    #[arg(short, long)]
    num_sims: Option<usize>,

    /// Use parallel processing
    #[arg(short, long, default_value = "false")]
    parallel: bool,

    /// Worker threads for parallel runs (defaults to the number of cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Base seed; trials are reproducible for a given seed and mode
    #[arg(short, long)]
    seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Write every outcome record as one JSON line to this file
    #[arg(long)]
    records: Option<PathBuf>,

    /// Show timing information
    #[arg(short, long, default_value = "false")]
    timing: bool,

    /// Debug: print the loaded scenario before simulating
    #[arg(long, default_value = "false")]
    debug_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Load scenario
    let scenario = match &args.config {
        Some(path) => match SimulationConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };

    if args.debug_config {
        match serde_yaml::to_string(&scenario) {
            Ok(yaml) => println!("{}", yaml),
            Err(e) => eprintln!("Error printing config: {}", e),
        }
    }

    let num_sims = args.num_sims.unwrap_or(scenario.simulation_runs);
    let threads = args.threads.unwrap_or_else(num_cpus::get).max(1);
    let seed = args.seed.unwrap_or_else(fresh_seed);

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Error starting thread pool: {}", e);
            std::process::exit(1);
        }
    };
    if args.parallel {
        info!("using {} worker threads", threads);
    }

    // Run simulations
    let start = Instant::now();
    let results = match pool.install(|| run_trials(&scenario, num_sims, args.parallel, Some(seed))) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Invalid scenario: {}", e);
            std::process::exit(1);
        }
    };
    let stats = AggregatedStats::from_results(&results);
    let elapsed = start.elapsed();
    info!("{} trials finished in {:.3}s", num_sims, elapsed.as_secs_f64());

    if let Some(path) = &args.records {
        if let Err(e) = write_records(path, &results) {
            eprintln!("Error writing records to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    // Output results
    match args.output {
        OutputFormat::Text => {
            println!("=== Gacha Simulation Results ===");
            println!("Simulations: {}", stats.simulations);
            println!("Seed: {}", seed);
            println!("Successes: {}", stats.successes);
            println!("Failures: {}", stats.failures);
            println!("Success Rate: {:.2}%", stats.success_rate);
            println!();
            print_summary("Character draws (excluding urgent)", &stats.character_pulls);
            print_summary("Weapon batches", &stats.weapon_batches);
            print_summary("Remaining weapon quota", &stats.quota_remaining);
            print_summary("Purchased weapon quota", &stats.quota_purchased);

            let causes = stats.failure_causes_by_count();
            if !causes.is_empty() {
                println!("Failure causes:");
                for (cause, count) in causes {
                    println!(
                        "  {}: {} ({:.1}%)",
                        cause,
                        count,
                        count as f64 / stats.failures as f64 * 100.0
                    );
                }
            }

            if args.timing {
                println!();
                println!("Elapsed: {:.3}s", elapsed.as_secs_f64());
                println!(
                    "Trials/sec: {:.0}",
                    num_sims as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                );
            }
        }
        OutputFormat::Json => {
            let mut output = serde_json::json!({
                "seed": seed,
                "stats": stats,
            });
            if args.timing {
                output["elapsed_secs"] = serde_json::json!(elapsed.as_secs_f64());
            }
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing results: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_summary(title: &str, summary: &Summary) {
    println!("{}:", title);
    println!("  Mean:   {:.2} ± {:.2}", summary.mean, summary.std_dev);
    println!("  Min:    {}", summary.min);
    println!("  Max:    {}", summary.max);
    println!("  Median: {}", summary.median);
    println!(
        "  P25/P75/P90/P95/P99: {:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
        summary.p25, summary.p75, summary.p90, summary.p95, summary.p99
    );
    println!();
}

/// One JSON object per line, in trial order
fn write_records(path: &Path, results: &[OutcomeRecord]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in results {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
