// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::{Deserialize, Serialize};

use crate::vision::DetectionRecord;

/// Result for one uploaded image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Original upload filename (empty when the client sent none)
    pub filename: String,
    /// Detections in emitted order
    pub detections: Vec<DetectionRecord>,
    /// Annotated PNG, base64 encoded, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// Response from POST /api/predict/text, one result per image in upload order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub results: Vec<PredictionResult>,
}
