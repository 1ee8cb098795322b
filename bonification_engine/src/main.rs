//! Entry point for the Bonification Engine binary.
//!
//! Running this binary starts an HTTP server that simulates order
//! bonuses against catalog and tier-rule snapshots.  The snapshot
//! directory is taken from `BONIFICATION_DATA_DIR` (default `data`),
//! the bind address from `BONIFICATION_BIND_ADDR` (default
//! `127.0.0.1:3000`).  Set `BONIFICATION_LOG_JSON=true` for JSON logs;
//! verbosity follows `RUST_LOG`.

use bonification_engine::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Invalid configuration: {err:#}");
            std::process::exit(2);
        }
    };
    init_tracing(settings.log_json);
    if let Err(err) = bonification_engine::api::serve(settings.bind_addr, &settings.data_dir).await {
        tracing::error!(error = ?err, "server terminated");
        std::process::exit(1);
    }
}
