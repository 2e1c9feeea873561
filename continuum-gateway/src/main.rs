/**
 * CONTINUUM GATEWAY - Point d'entrée de la passerelle d'ingestion
 *
 * RÔLE : Bootstrap : config, keyed store (Redis ou mémoire), client processor,
 * worker de remise, serveur HTTP.
 */

use anyhow::Context;
use continuum_core::{HttpProcessorClient, KeyedStore, MemoryStore, ProcessorClient, RedisStore};
use continuum_gateway::{assemble, build_router, load_config};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("continuum_gateway=info,continuum_core=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = load_config().await;

    let store: Arc<dyn KeyedStore> = match &cfg.redis_url {
        Some(url) => Arc::new(
            RedisStore::connect(url, cfg.store_timeout())
                .await
                .with_context(|| format!("failed to connect to redis at {url}"))?,
        ),
        None => {
            warn!("no redis_url configured, buffering in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let processor: Arc<dyn ProcessorClient> = Arc::new(
        HttpProcessorClient::new(&cfg.processor_url, cfg.forward_timeout(), cfg.health_timeout())
            .context("failed to build processor client")?,
    );

    let (app_state, _forwarder) = assemble(&cfg, store, processor)?;
    let app = build_router(app_state);

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr))?;
    info!("gateway listening on http://{}", cfg.listen_addr);
    info!("forwarding to processor at {}", cfg.processor_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down gateway");
        })
        .await?;
    Ok(())
}
