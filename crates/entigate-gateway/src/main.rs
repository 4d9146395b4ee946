//! Entigate HTTP/JSON gateway binary.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use clap::Parser;
use entigate_client::{EngineConfig, RemoteBackend};
use entigate_gateway::{create_router, AppState, Args, GatewayConfig, GatewayFile, LogFormat};
use entigate_proto::AttributeSource;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = GatewayConfig::from(&args);

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::from_default_env());
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }

    let file = match &config.config_path {
        Some(path) => GatewayFile::load(path)?,
        None => GatewayFile::default(),
    };
    info!(
        listen = %config.listen_addr,
        entity_types = file.entity_types.len(),
        attributes = file.attributes.len(),
        backend_timeout = ?config.backend_timeout,
        "Starting entigate gateway"
    );

    let mut engines = vec![EngineConfig::new(AttributeSource::Qs, &config.qs_addr).with_timeout(config.client_timeout)];
    if let Some(eds) = &config.eds_addr {
        engines.push(EngineConfig::new(AttributeSource::Eds, eds).with_timeout(config.client_timeout));
    }
    let backend = RemoteBackend::connect(engines)?;
    let sources: Vec<AttributeSource> = backend.sources().collect();

    let state = AppState::new(Arc::new(backend), sources, &file, config.clone())?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Gateway listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
