use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing from `RUST_LOG`, defaulting to `info`. JSON output is meant for servers
/// whose logs are collected.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    // A second init (tests, embedding) keeps the first subscriber
    if json {
        subscriber.json().try_init().ok();
    } else {
        subscriber.try_init().ok();
    }
}
