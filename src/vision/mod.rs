// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Open-vocabulary detection and segmentation
//!
//! This module provides:
//! - The model catalog and a process-wide model cache
//! - The YOLOE backend on ONNX Runtime
//! - Detection records and annotated image rendering

pub mod annotate;
pub mod catalog;
pub mod detections;
pub mod hub;
pub mod image_utils;
pub mod model;
pub mod model_cache;
pub mod records;
pub mod yoloe;

pub use catalog::{ModelKey, DEFAULT_MODEL_ID, SUPPORTED_MODELS};
pub use detections::{ColumnLengthMismatch, DataColumn, Detections};
pub use image_utils::{decode_image_bytes, detect_format, encode_png_base64, ImageError, ImageInfo};
pub use model::{ModelError, PredictConfig, SegmentationModel, TextPrompt};
pub use model_cache::{ModelCache, ModelHandle, ModelLoader};
pub use records::{to_records, DetectionRecord};
