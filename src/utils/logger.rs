use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter_for(verbose: bool, default_level: &str) -> EnvFilter {
    if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("auto_compressor=trace,debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("auto_compressor={}", default_level)))
    }
}

pub fn init_cli_logger(verbose: bool, default_level: &str) {
    tracing_subscriber::registry()
        .with(filter_for(verbose, default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON output for running unattended (systemd journal, log shippers).
pub fn init_service_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter_for(false, default_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .json(),
        )
        .init();
}
