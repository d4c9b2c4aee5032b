// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared helpers for integration tests: stub models, a counting loader and
//! a multipart body builder

#![allow(dead_code)]

use async_trait::async_trait;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::Array2;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use yoloe_api::{
    api::{create_app, AppState},
    vision::{
        catalog::ModelKey, DataColumn, Detections, ModelCache, ModelError, ModelHandle,
        ModelLoader, PredictConfig, SegmentationModel, TextPrompt,
    },
};

/// Deterministic model: one detection per label, class id = label index
#[derive(Debug)]
pub struct StubModel {
    pub name: String,
}

impl StubModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SegmentationModel for StubModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode_text(&self, labels: &[String]) -> Result<TextPrompt, ModelError> {
        TextPrompt::new(labels.to_vec(), Array2::ones((labels.len(), 8)))
    }

    fn predict(
        &self,
        image: &RgbImage,
        prompt: &TextPrompt,
        _config: &PredictConfig,
    ) -> Result<Detections, ModelError> {
        let (w, h) = image.dimensions();
        let count = prompt.labels().len();

        let boxes: Vec<[f32; 4]> = (0..count)
            .map(|i| {
                let offset = i as f32 * 2.0;
                [offset, offset, w as f32 / 2.0 + offset, h as f32 / 2.0 + offset]
            })
            .collect();
        let masks: Vec<GrayImage> = (0..count)
            .map(|_| GrayImage::from_pixel(w, h, Luma([0])))
            .collect();
        let names: Vec<String> = prompt.labels().to_vec();

        Ok(Detections::new(boxes)
            .with_confidence(vec![0.9; count])?
            .with_class_id((0..count as i64).collect())?
            .with_mask(masks)?
            .with_data("class_name", DataColumn::Str(names))?)
    }
}

/// Loader that counts calls, optionally fails, and yields to widen race windows
pub struct StubLoader {
    pub calls: AtomicUsize,
    pub failures_left: AtomicUsize,
    pub delay: Duration,
}

impl StubLoader {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: Duration::from_millis(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self, times: usize) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for StubLoader {
    async fn load(&self, key: &ModelKey) -> Result<ModelHandle, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ModelError::Fetch {
                repo: "jameslahm/yoloe".to_string(),
                filename: key.weights_filename("onnx"),
                message: "network unreachable".to_string(),
            });
        }

        Ok(Arc::new(StubModel::new(key.to_string())))
    }
}

/// Router backed by a stub loader
pub fn test_app() -> (axum::Router, Arc<ModelCache>, Arc<StubLoader>) {
    test_app_with_limit(yoloe_api::api::http_server::DEFAULT_MAX_UPLOAD_BYTES)
}

/// Router backed by a stub loader, with a custom request body limit
pub fn test_app_with_limit(
    max_upload_bytes: usize,
) -> (axum::Router, Arc<ModelCache>, Arc<StubLoader>) {
    let loader = Arc::new(StubLoader::new());
    let cache = Arc::new(ModelCache::new(loader.clone()));
    let state = AppState::new(cache.clone()).with_max_upload_bytes(max_upload_bytes);
    (create_app(state), cache, loader)
}

/// Solid-color JPEG of the given size
pub fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 144, 255]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Jpeg)
        .expect("encode test jpeg");
    buffer.into_inner()
}

pub const BOUNDARY: &str = "yoloe-test-boundary";

/// Minimal multipart/form-data body builder
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }
}
