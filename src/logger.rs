// XMPSWEEP LOGGING
// DIAGNOSTICS GO TO STDERR THROUGH TRACING. STDOUT IS RESERVED FOR THE
// PROGRESS BANNERS AND THE FINAL REPORT.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default = if verbose { "xmpsweep=debug" } else { "xmpsweep=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A SECOND INIT (E.G. FROM TESTS) IS HARMLESS
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
