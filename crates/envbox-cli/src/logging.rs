use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Initialize the global tracing subscriber.
///
/// Call once at program startup. Respects `ENVBOX_LOG` for filtering
/// (falls back to `RUST_LOG`, then `envbox=info,warn`); with neither env
/// var set, only warnings and above are printed so a plain `envbox list`
/// stays quiet.
pub fn init() {
    let env_filter = std::env::var("ENVBOX_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("envbox=info,warn"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .compact();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(subscriber)
        .init();
}
