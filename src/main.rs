// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use std::{env, sync::Arc};
use yoloe_api::{
    api::{start_server, AppState},
    config::ServerConfig,
    version,
    vision::{yoloe::OnnxYoloeLoader, ModelCache, SegmentationModel},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = ServerConfig::parse();
    tracing::info!("🚀 Starting {}", version::get_version_string());
    tracing::info!(
        "📦 Weights from {} (.{}), device {:?}",
        config.hub_repo,
        config.weights_extension,
        config.device
    );

    let loader = OnnxYoloeLoader::new(config.loader_config())?;
    let model_cache = Arc::new(ModelCache::new(Arc::new(loader)));

    for model_id in &config.preload {
        match model_cache.get_or_load(model_id, false).await {
            Ok(model) => tracing::info!("✅ Preloaded {}", model.name()),
            Err(e) => tracing::warn!("⚠️ Failed to preload {}: {}", model_id, e),
        }
    }

    let state = AppState::new(model_cache).with_max_upload_bytes(config.max_upload_bytes);
    let addr = config.listen_addr()?;

    start_server(addr, state)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    tracing::info!("👋 Server stopped");
    Ok(())
}
