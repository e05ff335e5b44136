use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Target used for per-request timing events.
pub const TIMING_TARGET: &str = "netilion::timing";

const DEFAULT_DIRECTIVES: &str = "netilion_client=info";
const VERBOSE_DIRECTIVES: &str = "netilion_client=debug,netilion::timing=debug,info";

fn default_filter(verbose: bool) -> EnvFilter {
    let directives = if verbose {
        VERBOSE_DIRECTIVES
    } else {
        DEFAULT_DIRECTIVES
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Fails when a global subscriber is already installed.
pub fn init_cli_logger(verbose: bool) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init()
}

/// Structured output for log shippers.
pub fn init_json_logger() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(default_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .try_init()
}
