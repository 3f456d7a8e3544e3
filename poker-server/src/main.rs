//! Poker server - runs the reconciliation daemon and serves its status over HTTP.

mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use axum::Router;
use clap::Parser;
use poker::daemon::{SCHEDULE_POLL, spawn_schedule, spawn_status_refresh};
use poker::engine::Engine;
use poker::io::docker::DockerCli;
use poker::io::git::GitCli;
use poker::logging;
use poker::settings::Settings;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "poker-server")]
#[command(about = "Reconciliation daemon with a status and administration API")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();
    let settings = args.settings;
    info!(
        config = %settings.config_file.display(),
        dry_run = settings.dry_run,
        "starting poker-server"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let config_file = settings.config_file.clone();
    let refresh = settings.refresh_interval();
    let shell = settings.system_shell();
    let engine = Engine::new(settings, GitCli, shell);
    let state = AppState::new(engine.view(), config_file);

    spawn_status_refresh(state.view.clone(), DockerCli, refresh, Arc::clone(&shutdown))?;
    spawn_schedule(engine, SCHEDULE_POLL, Arc::clone(&shutdown))?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
