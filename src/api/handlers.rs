// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::version::{GITHUB_URL, PAPER_URL};
use crate::vision::SUPPORTED_MODELS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub documentation_url: String,
    pub github: String,
    pub paper: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// GET / - Service banner with pointers to documentation
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "YOLOE API is running. Visit /docs for API documentation.".to_string(),
        documentation_url: "/docs".to_string(),
        github: GITHUB_URL.to_string(),
        paper: PAPER_URL.to_string(),
    })
}

/// GET /api/models - Identifiers accepted as `model_id`
pub async fn models_handler() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: SUPPORTED_MODELS.iter().map(|m| m.to_string()).collect(),
    })
}
