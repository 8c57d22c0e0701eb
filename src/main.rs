//! Command-line front end: loads a built-in problem, validates the thread
//! budget and precision, relaxes the grid and prints it before and after.

use cbr::{
    Admission, ConfigError, SolveConfig, SolveError,
    problem::{self, ProblemError},
};
use clap::{ArgAction, Parser, ValueEnum};
use log::{LevelFilter, info};
use std::{error::Error as _, fs, io, path::PathBuf, process::ExitCode, time::Instant};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "cbr")]
#[command(about = "Relax a built-in grid problem with bounded red/black update tasks", long_about = None)]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Problem id (see --list)
    #[arg(value_name = "PROBLEM_ID", required_unless_present = "list")]
    problem: Option<i64>,
    /// Maximum number of update tasks in flight
    #[arg(value_name = "THREADS", required_unless_present = "list")]
    threads: Option<usize>,
    /// Stop once no cell moves by this much or more
    #[arg(value_name = "PRECISION", required_unless_present = "list")]
    precision: Option<f64>,
    /// How to wait for a free task slot
    #[arg(long, value_enum, default_value_t = AdmissionArg::Block)]
    admission: AdmissionArg,
    /// Also write the solution to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// List the built-in problems and exit
    #[arg(long)]
    list: bool,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
enum AdmissionArg {
    /// Busy-wait on the slot table
    Spin,
    /// Park until a slot is released
    Block,
}

impl From<AdmissionArg> for Admission {
    fn from(arg: AdmissionArg) -> Self {
        match arg {
            AdmissionArg::Spin => Self::Spin,
            AdmissionArg::Block => Self::Block,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error("solve failed")]
    Solve(#[from] SolveError),
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(args: &Args) -> Result<(), CliError> {
    if args.list {
        for (id, problem) in problem::catalogue() {
            println!("{id}: {} ({1}x{1})", problem.name, problem.dimension);
        }
        return Ok(());
    }

    // clap enforces presence unless --list is given.
    let (Some(problem_id), Some(threads), Some(precision)) =
        (args.problem, args.threads, args.precision)
    else {
        unreachable!("clap: positional arguments are required without --list");
    };

    let config = SolveConfig::new(threads, precision)?.with_admission(args.admission.into());
    let mut grid = problem::load(problem_id)?;

    println!("Input:");
    print!("{grid}");

    let started = Instant::now();
    let report = cbr::solve(&mut grid, &config)?;
    info!(
        "{:?} in {:?}: {} passes, {} tasks, {} threads, {} admission",
        report.status,
        started.elapsed(),
        report.passes,
        report.tasks_spawned,
        config.threads(),
        config.admission(),
    );

    println!("\nSolution:");
    print!("{grid}");

    if let Some(path) = &args.output {
        fs::write(path, grid.to_string()).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}
