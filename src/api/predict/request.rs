// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction request parsing and validation

use axum_extra::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;
use std::str::FromStr;

use crate::api::errors::ApiError;
use crate::vision::{PredictConfig, DEFAULT_MODEL_ID};

/// An uploaded image file, kept in memory
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content: Bytes,
}

/// Decoded form of POST /api/predict/text
#[derive(Debug, Clone)]
pub struct TextPredictRequest {
    /// One or more images, in upload order
    pub images: Vec<UploadedImage>,
    /// Class names split from the `texts` field
    pub labels: Vec<String>,
    /// Model identifier (default `yoloe-11l`)
    pub model_id: String,
    /// Inference size and thresholds
    pub config: PredictConfig,
    /// Whether to render and return an annotated image
    pub return_image: bool,
}

impl TextPredictRequest {
    /// Read every multipart field, then validate
    ///
    /// Files under `images` are collected; any other field is read as text
    /// and the last value of a repeated name wins.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut images = Vec::new();
        let mut fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Failed to read image: {}", e))
                })?;
                images.push(UploadedImage { filename, content });
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Failed to read field '{}': {}", name, e))
                })?;
                fields.insert(name, value);
            }
        }

        Self::from_fields(images, &fields)
    }

    /// Build a request from already-collected form values
    ///
    /// # Errors
    /// `ApiError::ValidationError` (422) when `images` or `texts` is missing
    /// or a scalar field does not parse
    pub fn from_fields(
        images: Vec<UploadedImage>,
        fields: &HashMap<String, String>,
    ) -> Result<Self, ApiError> {
        if images.is_empty() {
            return Err(ApiError::validation("images", "Field required"));
        }
        let texts = fields
            .get("texts")
            .ok_or_else(|| ApiError::validation("texts", "Field required"))?;

        let defaults = PredictConfig::default();
        let config = PredictConfig {
            image_size: parse_scalar(fields, "image_size", defaults.image_size)?,
            conf_thresh: parse_scalar(fields, "conf_thresh", defaults.conf_thresh)?,
            iou_thresh: parse_scalar(fields, "iou_thresh", defaults.iou_thresh)?,
        };

        let return_image = match fields.get("return_image") {
            Some(raw) => parse_form_bool(raw).ok_or_else(|| {
                ApiError::validation("return_image", "Input should be a valid boolean")
            })?,
            None => true,
        };

        let model_id = fields
            .get("model_id")
            .cloned()
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        Ok(Self {
            images,
            labels: parse_labels(texts),
            model_id,
            config,
            return_image,
        })
    }
}

fn parse_scalar<T: FromStr>(
    fields: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ApiError> {
    match fields.get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ApiError::validation(name, format!("Input should be a valid number, got '{}'", raw))
        }),
    }
}

/// Split a comma-separated class list, trimming each entry
///
/// Empty entries are kept, so `"cat,,dog"` yields three labels.
pub fn parse_labels(texts: &str) -> Vec<String> {
    texts.split(',').map(|t| t.trim().to_string()).collect()
}

/// Parse a form boolean the way HTML form handling does
pub fn parse_form_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
        "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
        _ => None,
    }
}
