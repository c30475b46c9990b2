mod audio;
mod config;
mod coordinator;
mod generator;
mod input;
mod item_kinds;
mod logging;
mod monitor;
mod presentation;
mod session;
mod sim;
mod state;
mod store;
mod types;
mod worker;

use std::str::FromStr;

use thiserror::Error;

use crate::item_kinds::KindPolicy;
use crate::types::Difficulty;

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command}: invalid {field} value: {value}")]
    InvalidValue {
        command: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{command}: unexpected argument: {arg}")]
    UnexpectedArgument { command: &'static str, arg: String },
}

/// Parse a positional value; `-` keeps the default.
fn parse_opt<T: FromStr>(
    command: &'static str,
    field: &'static str,
    arg: &str,
) -> Result<Option<T>, CliError> {
    if arg == "-" {
        return Ok(None);
    }
    arg.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| CliError::InvalidValue {
            command,
            field,
            value: arg.to_string(),
        })
}

/// Parse a comma-separated set; `-` keeps the default.
fn parse_set<T: FromStr>(
    command: &'static str,
    field: &'static str,
    arg: &str,
) -> Result<Option<Vec<T>>, CliError> {
    if arg == "-" {
        return Ok(None);
    }
    let invalid = || CliError::InvalidValue {
        command,
        field,
        value: arg.to_string(),
    };
    let mut values = Vec::new();
    for part in arg.split(',') {
        if part.trim().is_empty() {
            return Err(invalid());
        }
        values.push(part.trim().parse::<T>().map_err(|_| invalid())?);
    }
    Ok(Some(values))
}

fn print_usage(program: &str) {
    println!("tedax: bomb squad coordination engine");
    println!("Usage:");
    println!("  {program} (run accelerated autopilot demo)");
    println!("  {program} play [difficulty] [workers] [stations] [seed] [kinds]");
    println!("  {program} bench [difficulty] [workers] [stations] [seed] [kinds] [validate]");
    println!("  {program} stress [worker_sets] [station_sets] [difficulty_sets] [validate]");
    println!("  {program} --help");
    println!();
    println!("Difficulty is easy, medium, or hard. Sets are comma-separated lists (e.g., 1,2,3).");
    println!("Kinds is mixed (weighted by difficulty) or button (buttons only).");
    println!("Use \"-\" to keep the default for any positional value.");
    println!("Defaults:");
    println!("  play   difficulty=easy workers=1 stations=1 kinds=mixed");
    println!("  bench  difficulty=medium workers=3 stations=2 kinds=mixed");
    println!("  stress worker_sets=1,2,3 station_sets=1,2,3 difficulty_sets=easy,medium,hard");
    println!("Pools are clamped to 1..=3.");
    println!("Flags:");
    println!("  validate  sample allocation invariants while running");
}

fn exit_with_usage(program: &str, err: &CliError) -> ! {
    eprintln!("{err}");
    print_usage(program);
    std::process::exit(2);
}

/// Split trailing flags off the positional arguments.
fn split_flags(args: impl Iterator<Item = String>) -> (Vec<String>, bool) {
    let mut positional = Vec::new();
    let mut validate = false;
    for arg in args {
        match arg.as_str() {
            "validate" => validate = true,
            _ => positional.push(arg),
        }
    }
    (positional, validate)
}

fn run_play(args: &[String]) -> Result<(), CliError> {
    const CMD: &str = "play";
    if let Some(extra) = args.get(5) {
        return Err(CliError::UnexpectedArgument {
            command: CMD,
            arg: extra.clone(),
        });
    }
    let arg = |idx: usize| args.get(idx).map(String::as_str).unwrap_or("-");
    let difficulty = parse_opt::<Difficulty>(CMD, "difficulty", arg(0))?;
    let workers = parse_opt::<usize>(CMD, "workers", arg(1))?;
    let stations = parse_opt::<usize>(CMD, "stations", arg(2))?;
    let seed = parse_opt::<u64>(CMD, "seed", arg(3))?;
    let kinds = parse_opt::<KindPolicy>(CMD, "kinds", arg(4))?;
    sim::run_play(difficulty, workers, stations, seed, kinds);
    Ok(())
}

fn run_bench(args: &[String], validate: bool) -> Result<(), CliError> {
    const CMD: &str = "bench";
    if let Some(extra) = args.get(5) {
        return Err(CliError::UnexpectedArgument {
            command: CMD,
            arg: extra.clone(),
        });
    }
    let arg = |idx: usize| args.get(idx).map(String::as_str).unwrap_or("-");
    let difficulty = parse_opt::<Difficulty>(CMD, "difficulty", arg(0))?;
    let workers = parse_opt::<usize>(CMD, "workers", arg(1))?;
    let stations = parse_opt::<usize>(CMD, "stations", arg(2))?;
    let seed = parse_opt::<u64>(CMD, "seed", arg(3))?;
    let kinds = parse_opt::<KindPolicy>(CMD, "kinds", arg(4))?;
    sim::run_benchmark(difficulty, workers, stations, seed, kinds, validate);
    Ok(())
}

fn run_stress(args: &[String], validate: bool) -> Result<(), CliError> {
    const CMD: &str = "stress";
    if let Some(extra) = args.get(3) {
        return Err(CliError::UnexpectedArgument {
            command: CMD,
            arg: extra.clone(),
        });
    }
    let arg = |idx: usize| args.get(idx).map(String::as_str).unwrap_or("-");
    let worker_sets = parse_set::<usize>(CMD, "worker_sets", arg(0))?;
    let station_sets = parse_set::<usize>(CMD, "station_sets", arg(1))?;
    let difficulty_sets = parse_set::<Difficulty>(CMD, "difficulty_sets", arg(2))?;
    sim::run_stress(worker_sets, station_sets, difficulty_sets, validate);
    Ok(())
}

fn main() {
    logging::init();
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "tedax".to_string());
    let mut args = std::env::args().skip(1);
    let command = args.next();
    let (positional, validate) = split_flags(args);
    let result = match command.as_deref() {
        Some("play") => run_play(&positional),
        Some("bench") => run_bench(&positional, validate),
        Some("stress") => run_stress(&positional, validate),
        Some("--help") | Some("-h") | Some("help") => {
            print_usage(&program);
            Ok(())
        }
        Some(other) => Err(CliError::UnknownCommand(other.to_string())),
        None => {
            sim::run_demo();
            Ok(())
        }
    };
    if let Err(err) = result {
        exit_with_usage(&program, &err);
    }
}
