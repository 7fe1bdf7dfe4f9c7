use std::sync::atomic::{AtomicBool, Ordering};

use stacked_errors::{Result, StackableErr};
use tracing_subscriber::EnvFilter;

/// Set by the handler that [ctrlc_init] installs
pub static CTRLC_ISSUED: AtomicBool = AtomicBool::new(false);

/// Installs a Ctrl-C handler that sets [CTRLC_ISSUED]. Children spawned
/// meanwhile are in the same process group and receive the interrupt
/// themselves.
pub fn ctrlc_init() -> Result<()> {
    ctrlc::set_handler(move || {
        CTRLC_ISSUED.store(true, Ordering::SeqCst);
    })
    .stack_err("ctrlc_init -> failed to set the Ctrl-C handler")?;
    Ok(())
}

/// Sets up a `tracing_subscriber` writing to stderr, filtered by `RUST_LOG`
/// and defaulting to `info`, and the Ctrl-C handler
pub fn std_init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    ctrlc_init()
}
