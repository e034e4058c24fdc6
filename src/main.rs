//! Swarm Testbed entry point
//!
//! Headless batch execution of queued test runs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use swarm_testbed::queue::{BatchRunner, PermutationSet, TestQueue};
use swarm_testbed::results::BatchReport;
use swarm_testbed::sim::SimContext;
use swarm_testbed::{Result, Settings, SimError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (missing file means defaults)
    #[arg(long, global = true, default_value = "settings.json")]
    settings: PathBuf,

    /// Debug-level diagnostics (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the RNG seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Override the maps directory
    #[arg(long, global = true)]
    maps_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every test in a queue file
    Run {
        /// Queue file (`.json` is appended if missing)
        #[arg(short, long)]
        queue: PathBuf,

        /// Expand this sweep over the queued test at `--base` instead of running the queue as is
        #[arg(short, long)]
        permutations: Option<PathBuf>,

        /// Index of the queued test a sweep is based on
        #[arg(long, default_value_t = 0)]
        base: usize,

        /// Write a per-run research log into the settings' log directory
        #[arg(long)]
        logs: bool,

        /// Save the batch report here
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Show registered behaviours, drone configurations, listeners, target types and maps
    List,
    /// Expand a sweep into a queue file without running it
    Sweep {
        /// Queue file holding the base test
        #[arg(short, long)]
        queue: PathBuf,

        #[arg(short, long)]
        permutations: PathBuf,

        #[arg(long, default_value_t = 0)]
        base: usize,

        /// Where to write the expanded queue
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(&cli.settings)?;
    if let Some(seed) = cli.seed {
        settings.seed = seed;
    }
    if let Some(dir) = cli.maps_dir {
        settings.maps_dir = dir;
    }
    if let Command::Run { logs: true, .. } = cli.command {
        settings.write_run_logs = true;
    }

    let ctx = SimContext::with_settings(settings);
    if let Err(e) = ctx.load_maps() {
        log::warn!("No maps loaded: {e}");
    }

    match cli.command {
        Command::Run {
            queue,
            permutations,
            base,
            report,
            ..
        } => {
            let mut queue = build_queue(&ctx, &queue, permutations.as_deref(), base)?;
            println!("Running {} tests", queue.len());
            let runner = BatchRunner::new(ctx);
            let results = runner.run_queue(&mut queue);
            print_report(&results);
            if let Some(path) = report {
                results.save(&path)?;
            }
            Ok(())
        }
        Command::List => {
            print_names("Behaviours", ctx.behaviours.borrow().names());
            print_names("Drone configurations", ctx.drone_configs.borrow().names());
            print_names("Contact listeners", ctx.listeners.borrow().names());
            print_names("Target types", ctx.targets.borrow().names());
            print_names("Maps", ctx.maps.borrow().names());
            Ok(())
        }
        Command::Sweep {
            queue,
            permutations,
            base,
            output,
        } => {
            let expanded = build_queue(&ctx, &queue, Some(&permutations), base)?;
            expanded.save(&output)?;
            println!("Wrote {} tests", expanded.len());
            Ok(())
        }
    }
}

/// Load a queue, optionally replacing it with a sweep over one of its tests
fn build_queue(ctx: &SimContext, path: &Path, permutations: Option<&Path>, base: usize) -> Result<TestQueue> {
    let queue = TestQueue::load(path)?;
    let Some(permutations) = permutations else {
        return Ok(queue);
    };
    let base = queue
        .get(base)
        .ok_or_else(|| SimError::lookup("queued test", base.to_string()))?
        .clone();
    let sweep = PermutationSet::load(permutations)?;
    let mut expanded = TestQueue::new();
    expanded.add_permuted_tests(
        &base,
        &sweep,
        &ctx.behaviours.borrow(),
        ctx.settings.max_permutations,
    )?;
    Ok(expanded)
}

fn print_names<'a>(title: &str, names: impl Iterator<Item = &'a str>) {
    println!("{title}:");
    for name in names {
        println!("  {name}");
    }
}

fn print_report(report: &BatchReport) {
    println!();
    println!(
        "{:>4}  {:<22} {:<14} {:>6} {:>7} {:>6} {:>10} {:>8}",
        "#", "behaviour", "map", "drones", "targets", "found", "wall ms", "RTF"
    );
    for run in &report.runs {
        match &run.error {
            None => println!(
                "{:>4}  {:<22} {:<14} {:>6} {:>7} {:>6} {:>10.0} {:>8.1}",
                run.index + 1,
                run.behaviour,
                run.map,
                run.num_drones,
                run.num_targets,
                run.targets_found,
                run.wall_ms,
                run.rtf
            ),
            Some(e) => println!("{:>4}  {:<22} {:<14} FAILED: {e}", run.index + 1, run.behaviour, run.map),
        }
    }
    println!(
        "\n{}/{} runs succeeded in {:.1}s",
        report.succeeded(),
        report.len(),
        report.total_wall_ms() / 1000.0
    );
}
