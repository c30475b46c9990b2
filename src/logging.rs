use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Debug builds log at `debug`, release builds only surface warnings;
/// `RUST_LOG` overrides both. Output goes to stderr so stdout stays free
/// for summaries and CSV.
pub fn init() {
    let default_level = if cfg!(debug_assertions) { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
