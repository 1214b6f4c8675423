use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize logging, panic handler, and build info reporting.
/// Returns a guard that must be kept alive for the duration of the program.
///
/// Logs go to stderr so they never mix with operation output on stdout.
pub fn init_logging(log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let (stderr_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let default_directive = log_level.parse::<Directive>().unwrap_or_else(|e| {
        eprintln!("Warning: invalid log level {:?}: {}", log_level, e);
        LevelFilter::WARN.into()
    });
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    register_panic_logger();
    report_build_info();

    guard
}

/// Registers a panic hook that logs panics using the `tracing` crate
fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

fn report_build_info() {
    let build = dlfs::version::build_info();

    tracing::debug!(
        build_profile = build.build_profile,
        version = build.version,
        target = build.target,
        "dlfs starting up"
    );
}
