// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text-prompted prediction endpoint module
//!
//! Provides POST /api/predict/text for detecting free-text classes in uploaded images.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{predict_text_handler, run_text_prediction};
pub use request::{parse_form_bool, parse_labels, TextPredictRequest, UploadedImage};
pub use response::{PredictResponse, PredictionResult};
