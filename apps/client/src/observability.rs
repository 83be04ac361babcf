use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_FILTER: &str = "info";

static CLIENT_TRACE_ID: OnceLock<String> = OnceLock::new();

/// Installs the JSON subscriber once per process; later calls are no-ops.
pub fn init_tracing() {
    let filter = log_filter(
        std::env::var("APP_LOG_LEVEL").ok(),
        std::env::var("RUST_LOG").ok(),
    );

    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(EnvFilter::new(&filter))
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }

    tracing::info!(
        component = "bootstrap",
        client = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        filter = %filter,
        trace_id = %trace_id(),
        "chat client tracing initialized"
    );
}

/// `APP_LOG_LEVEL` wins over `RUST_LOG`; blank values are ignored.
fn log_filter(app_level: Option<String>, rust_log: Option<String>) -> String {
    [app_level, rust_log]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Per-process id stamped on every `AppError`.
pub fn trace_id() -> &'static str {
    CLIENT_TRACE_ID.get_or_init(|| Uuid::new_v4().to_string())
}
