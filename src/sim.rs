use tracing::info;

use crate::audio::{AudioSettings, SilentAudio, Soundtrack};
use crate::config::{Cadence, SessionConfig};
use crate::input::{self, Autopilot};
use crate::item_kinds::KindPolicy;
use crate::presentation::{FramePresenter, TracingPresenter};
use crate::session::{Session, SessionReport};
use crate::types::Difficulty;

// Headless runs compress every cadence by this factor (1s ticks become 50ms).
const FAST_SPEEDUP: u32 = 20;
const DEMO_SEED: u64 = 2024;
const DEMO_MISTAKE_RATE: f64 = 0.25;
const BENCH_MISTAKE_RATE: f64 = 0.1;
const ASSET_DIR: &str = "assets";

const CSV_HEADER: &str = "difficulty,kinds,workers,stations,outcome,resolved,required,generated,failed_attempts,elapsed_ms,cpu_user_s,cpu_sys_s,invariant_samples,invariant_violations";

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// A session report plus the CPU it cost.
struct BenchResult {
    kinds: KindPolicy,
    report: SessionReport,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
}

fn silent_audio(difficulty: Difficulty) -> SilentAudio {
    SilentAudio::new(AudioSettings::new(difficulty, false))
}

/// Run one accelerated session driven by the autopilot.
fn headless_session(config: SessionConfig, mistake_rate: f64) -> SessionReport {
    let difficulty = config.difficulty;
    let seed = config.seed;
    let session = Session::new(config);
    let pilot = Autopilot::new(session.state(), seed, mistake_rate);
    session.run(
        Box::new(pilot),
        Box::new(TracingPresenter::default()),
        &mut silent_audio(difficulty),
        &Soundtrack::in_dir(ASSET_DIR),
    )
}

fn benchmark_once(
    difficulty: Difficulty,
    kinds: KindPolicy,
    workers: usize,
    stations: usize,
    seed: Option<u64>,
    validate: bool,
) -> BenchResult {
    let config = SessionConfig::new(difficulty)
        .with_pools(workers, stations)
        .with_seed(seed)
        .with_kind_weights(kinds.weights(difficulty))
        .with_cadence(Cadence::scaled(FAST_SPEEDUP))
        .with_validation(validate);
    let cpu_start = cpu_times_seconds();
    let report = headless_session(config, BENCH_MISTAKE_RATE);
    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };
    BenchResult {
        kinds,
        report,
        cpu_user_s,
        cpu_sys_s,
    }
}

fn print_csv_row(result: &BenchResult, validate: bool) {
    let report = &result.report;
    let cpu_user = result
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = result
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    println!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        report.difficulty,
        result.kinds,
        report.workers,
        report.stations,
        report.outcome,
        report.resolved,
        report.required,
        report.generated,
        report.failed_attempts,
        report.elapsed.as_millis(),
        cpu_user,
        cpu_sys,
        report.invariant_samples,
        report.invariant_violations
    );
    if validate && report.invariant_violations > 0 {
        eprintln!("# violation,invariants,{}", report.invariant_violations);
    }
}

fn print_summary(title: &str, report: &SessionReport) {
    println!("{title}");
    println!(
        "difficulty={} workers={} stations={}",
        report.difficulty, report.workers, report.stations
    );
    println!("outcome={}", report.outcome);
    println!("resolved={}/{}", report.resolved, report.required);
    println!("items_generated={}", report.generated);
    println!("failed_attempts={}", report.failed_attempts);
    println!("time_left_s={}", report.remaining_secs);
    println!("invariant_samples={}", report.invariant_samples);
    println!("invariant_violations={}", report.invariant_violations);
}

/// Run an accelerated autopilot session and print a summary.
pub fn run_demo() {
    info!("demo starting");
    let config = SessionConfig::new(Difficulty::Easy)
        .with_pools(2, 2)
        .with_seed(Some(DEMO_SEED))
        .with_cadence(Cadence::scaled(FAST_SPEEDUP))
        .with_validation(true);
    let report = headless_session(config, DEMO_MISTAKE_RATE);
    print_summary("DEMO SUMMARY", &report);
}

/// Play in real time: one instruction per stdin line, `q` to quit.
pub fn run_play(
    difficulty: Option<Difficulty>,
    workers: Option<usize>,
    stations: Option<usize>,
    seed: Option<u64>,
    kinds: Option<KindPolicy>,
) {
    let difficulty = difficulty.unwrap_or(Difficulty::Easy);
    let kinds = kinds.unwrap_or_default();
    let config = SessionConfig::new(difficulty)
        .with_pools(workers.unwrap_or(1), stations.unwrap_or(1))
        .with_seed(seed)
        .with_kind_weights(kinds.weights(difficulty));
    println!("Type an instruction and press enter to send it to the first pending module.");
    println!("Buttons: p per press. Passwords: map letters through the keypad. Wires: position to cut. q quits.");
    let session = Session::new(config);
    let report = session.run(
        Box::new(input::spawn_stdin_reader()),
        Box::new(FramePresenter::new(std::io::stdout())),
        &mut SilentAudio::new(AudioSettings::new(difficulty, true)),
        &Soundtrack::in_dir(ASSET_DIR),
    );
    print_summary("GAME OVER", &report);
}

/// Run a single benchmark with optional parameter overrides.
pub fn run_benchmark(
    difficulty: Option<Difficulty>,
    workers: Option<usize>,
    stations: Option<usize>,
    seed: Option<u64>,
    kinds: Option<KindPolicy>,
    validate: bool,
) {
    let difficulty = difficulty.unwrap_or(Difficulty::Medium);
    let kinds = kinds.unwrap_or_default();
    let result = benchmark_once(
        difficulty,
        kinds,
        workers.unwrap_or(3),
        stations.unwrap_or(2),
        seed,
        validate,
    );
    println!("{CSV_HEADER}");
    print_csv_row(&result, validate);
}

/// Sweep pool sizes and difficulties and print CSV output.
pub fn run_stress(
    worker_sets: Option<Vec<usize>>,
    station_sets: Option<Vec<usize>>,
    difficulty_sets: Option<Vec<Difficulty>>,
    validate: bool,
) {
    // Pool sizes outside 1..=3 are clamped by the session config.
    let worker_sets = worker_sets.unwrap_or_else(|| vec![1, 2, 3]);
    let station_sets = station_sets.unwrap_or_else(|| vec![1, 2, 3]);
    let difficulty_sets = difficulty_sets.unwrap_or_else(|| Difficulty::ALL.to_vec());

    println!("{CSV_HEADER}");
    for difficulty in difficulty_sets {
        for workers in worker_sets.iter().copied() {
            for stations in station_sets.iter().copied() {
                let result = benchmark_once(
                    difficulty,
                    KindPolicy::Mixed,
                    workers,
                    stations,
                    None,
                    validate,
                );
                print_csv_row(&result, validate);
            }
        }
    }
}
