use std::path::Path;

const DEFAULT_FILTER: &str = "community_chat_core=debug,info";

/// Logging initialization, called once at the start of `FfiApp::new()`.
///
/// Writes to stderr with an `EnvFilter` (`RUST_LOG`, falling back to
/// `community_chat_core=debug,info`). When `log_to_file` is set, a second
/// non-ANSI layer appends to `<data_dir>/community_chat.log` so logs stay
/// retrievable from embedded hosts without a console. Repeated calls are no-ops.
pub fn init_logging(data_dir: &str, log_to_file: bool) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let file_layer = if log_to_file {
        let log_path = Path::new(data_dir).join("community_chat.log");
        let _ = std::fs::create_dir_all(data_dir);
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()
            .map(|file| {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
            })
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
}
