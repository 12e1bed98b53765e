//! Gateway binary.
//!
//! Exposes the trust engine over a small HTTP API:
//!
//! - `POST /init-repo`
//! - `POST /access-control`
//! - `POST /commit`
//! - `GET /latest-hash/{repo_id}`
//! - `GET /tee-pubkey`
//!
//! The gateway carries no trust logic: it marshals JSON into typed engine
//! messages and back. The engine itself is single-threaded, so one coarse
//! mutex serializes every command.

mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use trustchain_enclave::{DirectoryStore, TrustEngine};

use state::AppState;

#[derive(Parser, Debug)]
#[command(about = "HTTP façade for the trustchain trust engine")]
struct Args {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Directory backing the enclave's sealed storage.
    #[arg(long, default_value = "trustchain-data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let store = DirectoryStore::open(&args.data_dir)?;
    let engine = TrustEngine::new(store);
    let state = Arc::new(AppState {
        engine: Mutex::new(engine),
    });

    let app = Router::new()
        .route(
            "/init-repo",
            post(routes::init_repo).options(routes::preflight),
        )
        .route(
            "/access-control",
            post(routes::access_control).options(routes::preflight),
        )
        .route("/commit", post(routes::commit).options(routes::preflight))
        .route(
            "/latest-hash/{repo_id}",
            get(routes::latest_hash).options(routes::preflight),
        )
        .route(
            "/tee-pubkey",
            get(routes::tee_public_key).options(routes::preflight),
        )
        .layer(axum::middleware::map_response(routes::with_cors))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    log::info!("trustchain gateway listening on port {}", args.port);
    axum::serve(listener, app).await?;
    Ok(())
}
