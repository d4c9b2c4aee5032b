// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide cache of loaded segmentation models
//!
//! Models are loaded lazily on first request for a key and kept for the
//! lifetime of the process. Concurrent misses on the same key share one load.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;

use super::catalog::ModelKey;
use super::model::{ModelError, SegmentationModel};

/// Shared handle to a loaded model
pub type ModelHandle = Arc<dyn SegmentationModel>;

/// Builds a model instance for a cache key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Resolve, fetch and initialise the model identified by `key`
    async fn load(&self, key: &ModelKey) -> Result<ModelHandle, ModelError>;
}

/// Keyed store of loaded models
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    slots: Mutex<HashMap<ModelKey, Arc<OnceCell<ModelHandle>>>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached model for `(model_id, prompt_free)`, loading it on a miss
    ///
    /// Unknown identifiers are rejected before the loader is consulted. A
    /// failed load leaves the slot empty so a later request tries again.
    ///
    /// # Returns
    /// * `Ok(ModelHandle)` - The same `Arc` for every call with this key
    /// * `Err(ModelError)` - If the id is unknown or loading failed
    pub async fn get_or_load(
        &self,
        model_id: &str,
        prompt_free: bool,
    ) -> Result<ModelHandle, ModelError> {
        let key = ModelKey::new(model_id, prompt_free);
        key.validate().map_err(ModelError::unknown_model)?;

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };

        if let Some(model) = slot.get() {
            tracing::debug!("Model cache hit for {}", key);
            return Ok(model.clone());
        }

        let model = slot
            .get_or_try_init(|| async {
                tracing::info!("📦 Loading model {}", key);
                let started = Instant::now();
                match self.loader.load(&key).await {
                    Ok(model) => {
                        tracing::info!(
                            "✅ Model {} loaded in {:.2}s",
                            key,
                            started.elapsed().as_secs_f32()
                        );
                        Ok(model)
                    }
                    Err(e) => {
                        tracing::warn!("⚠️ Failed to load model {}: {}", key, e);
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(model.clone())
    }

    /// Keys whose models are currently loaded, sorted
    pub fn loaded_keys(&self) -> Vec<ModelKey> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<ModelKey> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}
