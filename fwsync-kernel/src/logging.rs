use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `info`, or `debug` with the debug flag.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Already installed (tests, embedding): keep the existing subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
