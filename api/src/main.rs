use api::app;
use api::state::AppState;
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use chrono::Utc;
use std::{net::SocketAddr, process::exit, time::Duration};
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;
use util::config::{AppConfig, DEV_JWT_SECRET};

#[tokio::main]
async fn main() {
    let config = AppConfig::global().clone();

    // Load configuration and initialize logging
    let _log_guard = init_logging(&config);

    if config.is_production() && config.jwt_secret == DEV_JWT_SECRET {
        tracing::error!("JWT_SECRET must be set in production");
        eprintln!("JWT_SECRET must be set in production");
        exit(1);
    }

    let db = match db::connect().await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, path = %config.database_path, "Failed to connect to database");
            eprintln!("Failed to connect to database {}: {e}", config.database_path);
            exit(1);
        }
    };

    let app_state = AppState::new(db, &config);

    spawn_maintenance(app_state.clone(), config.maintenance_interval_seconds);

    let cors = CorsLayer::very_permissive()
        .expose_headers([CONTENT_TYPE, RETRY_AFTER, api::auth::middleware::X_RATELIMIT_REMAINING]);
    let app = app(app_state).layer(cors);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Invalid HOST/PORT {}:{}: {e}", config.host, config.port);
            exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            exit(1);
        }
    };

    println!("Starting {} on http://{}", config.project_name, addr);
    tracing::info!(%addr, env = %config.env, "Server started");

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %e, "Server crashed");
        exit(1);
    }
}

fn init_logging(config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("api=info,services=info,security_alert=error"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if config.log_to_stdout {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}

/// Runs the maintenance sweep every `interval_seconds`, independent of traffic.
fn spawn_maintenance(app_state: AppState, interval_seconds: u64) {
    let maintenance = app_state.maintenance();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
        loop {
            ticker.tick().await;
            maintenance.sweep(Utc::now()).await;
        }
    });
}
