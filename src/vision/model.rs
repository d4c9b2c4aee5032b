// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Segmentation model abstraction
//!
//! The detector, prompt encoder and non-max suppression are consumed through
//! [`SegmentationModel`]. Labels travel with each call inside a
//! [`TextPrompt`], so a shared model instance carries no per-request state.

use image::RgbImage;
use ndarray::Array2;
use std::fmt::Debug;
use thiserror::Error;

use super::catalog::SUPPORTED_MODELS;
use super::detections::{ColumnLengthMismatch, Detections};

/// Errors raised while loading or running a model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown model '{model}'. Supported models: {}", supported.join(", "))]
    UnknownModel {
        model: String,
        supported: Vec<String>,
    },

    #[error("Failed to fetch '{filename}' from '{repo}': {message}")]
    Fetch {
        repo: String,
        filename: String,
        message: String,
    },

    #[error("Inference runtime error: {0}")]
    Runtime(String),

    #[error("Text encoding failed: {0}")]
    TextEncoding(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

impl ModelError {
    pub fn unknown_model(model: impl Into<String>) -> Self {
        ModelError::UnknownModel {
            model: model.into(),
            supported: SUPPORTED_MODELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<ColumnLengthMismatch> for ModelError {
    fn from(err: ColumnLengthMismatch) -> Self {
        ModelError::InvalidOutput(err.to_string())
    }
}

/// Per-call inference parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictConfig {
    /// Square inference resolution in pixels
    pub image_size: u32,
    /// Minimum confidence for a detection to be kept
    pub conf_thresh: f32,
    /// IoU threshold used by non-max suppression
    pub iou_thresh: f32,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            image_size: 640,
            conf_thresh: 0.25,
            iou_thresh: 0.70,
        }
    }
}

/// Encoded open-vocabulary label set, one embedding row per label
#[derive(Debug, Clone)]
pub struct TextPrompt {
    labels: Vec<String>,
    embeddings: Array2<f32>,
}

impl TextPrompt {
    pub fn new(labels: Vec<String>, embeddings: Array2<f32>) -> Result<Self, ModelError> {
        if embeddings.nrows() != labels.len() {
            return Err(ModelError::TextEncoding(format!(
                "{} embeddings for {} labels",
                embeddings.nrows(),
                labels.len()
            )));
        }
        Ok(Self { labels, embeddings })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn embeddings(&self) -> &Array2<f32> {
        &self.embeddings
    }

    /// Label text for a class index, if it is in range
    pub fn label(&self, class_id: i64) -> Option<&str> {
        usize::try_from(class_id)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// An open-vocabulary detection/segmentation model
///
/// Implementations must be safe to share between requests; calls with
/// different prompts may interleave.
pub trait SegmentationModel: Send + Sync + Debug {
    /// Human-readable model name for logging
    fn name(&self) -> &str;

    /// Encode class names into prompt embeddings
    fn encode_text(&self, labels: &[String]) -> Result<TextPrompt, ModelError>;

    /// Detect and segment the prompted classes in one image
    ///
    /// # Arguments
    /// * `image` - Source bitmap at its original resolution
    /// * `prompt` - Label set produced by [`SegmentationModel::encode_text`]
    /// * `config` - Resolution and thresholds for this call
    ///
    /// # Returns
    /// Detections in source image coordinates, with class ids indexing into
    /// the prompt's labels
    fn predict(
        &self,
        image: &RgbImage,
        prompt: &TextPrompt,
        config: &PredictConfig,
    ) -> Result<Detections, ModelError>;
}
