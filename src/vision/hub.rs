// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Weight artifact download from the Hugging Face hub

use hf_hub::api::tokio::{Api, ApiBuilder};
use std::path::PathBuf;

use super::model::ModelError;

/// Fetches files by `(repo, filename)`, reusing the local hub cache
pub struct HubFetcher {
    api: Api,
}

impl HubFetcher {
    /// Create a fetcher
    ///
    /// # Arguments
    /// * `cache_dir` - Override for the hub cache location (defaults to the hub's own)
    /// * `token` - Access token for gated or private repositories
    pub fn new(cache_dir: Option<PathBuf>, token: Option<String>) -> Result<Self, ModelError> {
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir);
        }
        if token.is_some() {
            builder = builder.with_token(token);
        }

        let api = builder.build().map_err(|e| ModelError::Fetch {
            repo: String::new(),
            filename: String::new(),
            message: format!("failed to initialise hub client: {}", e),
        })?;

        Ok(Self { api })
    }

    /// Return the local path of `filename` in `repo`, downloading it on a cache miss
    pub async fn fetch(&self, repo: &str, filename: &str) -> Result<PathBuf, ModelError> {
        tracing::info!("Fetching {} from {}", filename, repo);
        self.api
            .model(repo.to_string())
            .get(filename)
            .await
            .map_err(|e| ModelError::Fetch {
                repo: repo.to_string(),
                filename: filename.to_string(),
                message: e.to_string(),
            })
    }
}
