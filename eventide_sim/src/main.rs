//! Eventide scenario CLI
//!
//! Runs queueing scenarios across seeds and reports how the simulated
//! statistics compare with queueing theory.

use clap::Parser;
use eventide_sim::scenarios::ScenarioId;
use eventide_sim::{RunReport, ScenarioConfig, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Eventide queueing scenario CLI
#[derive(Parser, Debug)]
#[command(name = "eventide-sim")]
#[command(about = "Run discrete-event queueing scenarios against analytic results", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (mm1, mmc, finite_buffer, two_stage, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Measured period in virtual hours
    #[arg(long)]
    hours: Option<f64>,

    /// Warm-up period in virtual hours
    #[arg(long)]
    warmup_hours: Option<f64>,

    /// JSON file with scenario parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Write the full report to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Eventide scenario runner v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: mm1, mmc, finite_buffer, two_stage, all");
                std::process::exit(2);
            }
        }
    };

    let mut config = match &args.config {
        Some(path) => match ScenarioConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: cannot load {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => ScenarioConfig::default(),
    };
    if let Some(hours) = args.hours {
        config = config.with_run_hours(hours);
    }
    if let Some(hours) = args.warmup_hours {
        config = config.with_warmup_hours(hours);
    }

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let mut report = RunReport::new(base_seed, config.clone());

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed).with_config(config.clone());

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED: utilization {:.3}, throughput {:.2}/h",
                        scenario.name(),
                        seed,
                        result.metrics.utilization,
                        result.metrics.throughput_per_hour
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            report.add_result(result);
        }
    }

    let total = report.results.len();
    let failed: Vec<&ScenarioResult> = report.failed().collect();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed.len(),
            "failed": failed.len(),
            "results": report.results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "events": r.events_executed,
                    "time_hours": r.final_time_hours,
                    "utilization": r.metrics.utilization,
                    "sojourn_hours": r.metrics.average_sojourn_hours,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed.is_empty() {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed.len(), total);
            for result in &failed {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if let Some(path) = &args.export {
        match report.write_to_file(path) {
            Ok(()) => info!("Exported {} results to {}", total, path.display()),
            Err(e) => error!("Failed to write export: {}", e),
        }
    }

    if !report.passed {
        std::process::exit(1);
    }
}
