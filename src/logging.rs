use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr; stdout carries the
/// outbound event stream.
///
/// `RUST_LOG` wins over the default level when set.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,printdesk=debug"
    } else {
        "warn,printdesk=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
