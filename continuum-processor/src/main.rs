/**
 * CONTINUUM PROCESSOR - Point d'entrée du processor
 *
 * RÔLE : Bootstrap : config, sink Pushgateway, serveur HTTP.
 */

use anyhow::Context;
use continuum_core::PushgatewaySink;
use continuum_processor::{assemble, build_router, load_config};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("continuum_processor=info,continuum_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = load_config().await;

    let sink = PushgatewaySink::new(cfg.pushgateway_url.clone(), cfg.push_timeout())
        .context("failed to build pushgateway client")?;
    let app = build_router(assemble(&cfg, Arc::new(sink))?);

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;
    info!("processor listening on http://{}", cfg.listen_addr);
    info!("pushing metrics to {}", cfg.pushgateway_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down processor");
        })
        .await?;
    Ok(())
}
