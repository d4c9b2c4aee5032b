// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text-prompted prediction handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::request::TextPredictRequest;
use super::response::{PredictResponse, PredictionResult};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::annotate;
use crate::vision::{decode_image_bytes, encode_png_base64, to_records, SegmentationModel};

/// POST /api/predict/text - Detect free-text classes in uploaded images
///
/// # Request (multipart/form-data)
/// - `images`: One or more image files (required)
/// - `texts`: Comma-separated class names (required)
/// - `model_id`: Model identifier - defaults to "yoloe-11l"
/// - `image_size`: Inference size - defaults to 640
/// - `conf_thresh`: Confidence threshold - defaults to 0.25
/// - `iou_thresh`: NMS IoU threshold - defaults to 0.70
/// - `return_image`: Return an annotated PNG - defaults to true
///
/// # Response
/// - `results`: One entry per image with `filename`, `detections` and
///   optionally `image_base64`
///
/// # Errors
/// - 400 Bad Request: Malformed multipart body
/// - 422 Unprocessable Entity: Missing or unparsable form fields
/// - 500 Internal Server Error: Unknown model, load failure, undecodable image or inference failure
pub async fn predict_text_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let request = TextPredictRequest::from_multipart(multipart).await?;
    debug!(
        "Predict request {}: {} images, {} labels, model {}",
        request_id,
        request.images.len(),
        request.labels.len(),
        request.model_id
    );

    let model = state.model_cache.get_or_load(&request.model_id, false).await?;

    let response = tokio::task::spawn_blocking(move || run_text_prediction(model.as_ref(), &request))
        .await
        .map_err(|e| ApiError::InternalError(format!("Prediction task failed: {}", e)))??;

    debug!("Predict request {} complete", request_id);
    Ok(Json(response))
}

/// Run one text-prompted request against a loaded model
///
/// Labels are encoded once and reused for every image. The first failing
/// image aborts the whole batch.
pub fn run_text_prediction(
    model: &dyn SegmentationModel,
    request: &TextPredictRequest,
) -> Result<PredictResponse, ApiError> {
    let started = Instant::now();
    let prompt = model.encode_text(&request.labels)?;

    let mut results = Vec::with_capacity(request.images.len());
    for upload in &request.images {
        let (image, info) = decode_image_bytes(&upload.content)?;
        debug!(
            "Decoded {}: {}x{}, {} bytes",
            upload.filename, info.width, info.height, info.size_bytes
        );

        let detections = model.predict(&image, &prompt, &request.config)?;

        let image_base64 = if request.return_image {
            let annotated = annotate::render(&image, &detections);
            Some(encode_png_base64(&annotated)?)
        } else {
            None
        };

        results.push(PredictionResult {
            filename: upload.filename.clone(),
            detections: to_records(&detections),
            image_base64,
        });
    }

    info!(
        "✅ {} processed {} images ({} detections) in {}ms",
        model.name(),
        results.len(),
        results.iter().map(|r| r.detections.len()).sum::<usize>(),
        started.elapsed().as_millis()
    );

    Ok(PredictResponse { results })
}
