mod api;
mod collectors;
mod core;
mod forms;
mod render;
mod utils;

use std::sync::Arc;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match utils::config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    utils::logging::init(&config.log_level, config.log_format);
    info!(db = %config.db_path.display(), bind = %config.bind, "Observation search starting");

    let backend = match utils::db::SqliteBackend::open(&config.db_path) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            std::process::exit(1);
        }
    };

    if let Some(seed) = &config.seed_file {
        let seeded = backend
            .connect()
            .map_err(collectors::seed::SeedError::from)
            .and_then(|mut conn| collectors::seed::load_seed_file(&mut conn, seed));
        if let Err(e) = seeded {
            tracing::warn!(error = %e, path = %seed.display(), "Seeding observations failed");
        }
    }

    let state = api::server::AppState {
        backend: Arc::new(backend),
        recent_limit: config.recent_limit,
    };
    if let Err(e) = api::server::run_server(state, config.bind, &config.web_dir).await {
        error!(error = %e, "Server terminated");
        std::process::exit(1);
    }
}
