//! RAT stub server: an in-memory stand-in for the Supabase REST surface and
//! the backend RAT API.
//!
//! Point both `RAT_SUPABASE_URL` and `RAT_BACKEND_URL` at it to exercise the
//! whole chain locally. `POST /_stub/outage` with
//! `{"supabase": true, "backend": false}` takes a surface down so the
//! fallback path can be watched end to end.
//!
//! Storage is in-memory (DashMap) with no persistence; data is lost on
//! restart.

mod routes;
mod store;

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("RAT_STUB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8091);

    let app = routes::router(store::AppState::new());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("rat-stub listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;
    Ok(())
}
