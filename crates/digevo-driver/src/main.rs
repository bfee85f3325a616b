//! Driver for a single digevo world.

mod api;
mod config;
mod runner;
mod telemetry;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use config::DriverConfig;
use digevo_exec::ReplicatorFactory;
use digevo_genome::Genome;
use digevo_world::World;
use runner::{Command, RunControl};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Config path from the first argument, then DIGEVO_CONFIG
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DIGEVO_CONFIG").ok())
        .map(PathBuf::from);
    let config = DriverConfig::load(path.as_deref())?;

    telemetry::init_telemetry(config.log_json)?;

    let ancestor: Genome = config
        .ancestor
        .parse()
        .with_context(|| format!("invalid ancestor genome {:?}", config.ancestor))?;
    let factory = Arc::new(ReplicatorFactory::new(config.replicator.clone()));
    let mut world = World::new(config.simulation.clone(), factory, None)?;
    world.inject(ancestor, config.inject_cell())?;
    info!(seed = world.seed(), cell = config.inject_cell(), "Ancestor injected");

    let control = Arc::new(RunControl::new());
    let run_control = control.clone();
    let mut run = tokio::task::spawn_blocking(move || runner::run_world(world, &run_control));

    let server = if config.api_enabled {
        let app = Router::new()
            .route("/health", get(api::health))
            .route("/api/stats", get(api::get_stats))
            .route("/api/exit", post(api::request_exit))
            .route("/api/comment", post(api::post_comment))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(api::AppState {
                control: control.clone(),
            });

        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Control API listening on {}", addr);
        Some(tokio::spawn(async move { axum::serve(listener, app).await }))
    } else {
        None
    };

    let result = tokio::select! {
        result = &mut run => result,
        _ = shutdown_signal() => {
            control.submit(Command::Exit);
            run.await
        }
    };

    if let Some(server) = server {
        server.abort();
    }

    match result.context("update loop panicked")? {
        Ok(stats) => {
            info!(
                updates = stats.update,
                organisms = stats.num_organisms,
                genotypes = stats.num_genotypes,
                "Driver exiting"
            );
            Ok(())
        }
        Err(e) => {
            error!(code = e.code(), "Run failed: {}", e);
            if e.is_fatal() {
                std::process::exit(e.code());
            }
            Err(e.into())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
