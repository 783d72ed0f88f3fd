/// Installs a `tracing` subscriber that prints to stdout.
///
/// Verbosity is read from `RUST_LOG`:
/// - `RUST_LOG=warn` - Only lenient paths and failures
/// - `RUST_LOG=debug` - Every store call, fetch and save
/// - `RUST_LOG=docmodel_core=debug` - Debug only for models and collections
///
/// The library itself never installs a subscriber. Calling this more than once, or
/// after another subscriber was installed, leaves the existing one in place.
///
/// ```ignore
/// docmodel::init_tracing();
/// ```
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    if installed.is_err() {
        tracing::debug!("a tracing subscriber is already installed");
    }
}
