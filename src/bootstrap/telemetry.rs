use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG`. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linkstore=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
