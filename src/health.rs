//! Optional uptime endpoint.
//!
//! Hosting platforms that expect a listening port (the original deployment
//! ran on Railway/Render) probe `/` for liveness. The endpoint runs on its
//! own task and deliberately shares no state with the scheduler: it can
//! only answer "running", never inspect or mutate the pipeline.

use axum::{routing::get, Router};
use tokio::net::TcpListener;

/// Bind `0.0.0.0:port` and answer uptime probes until the process exits.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve_listener(listener).await
}

/// Serve on an already-bound listener. Split out so tests can bind port 0.
pub async fn serve_listener(listener: TcpListener) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Health endpoint listening");
    axum::serve(listener, router()).await?;
    Ok(())
}

fn router() -> Router {
    Router::new().route("/", get(|| async { "running" }))
}
