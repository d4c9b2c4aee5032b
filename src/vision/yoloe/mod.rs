// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOE segmentation backend on ONNX Runtime
//!
//! Weight artifacts are fetched from the hub on first use. Every detector
//! shares one text encoder, loaded together with the first prompted model.

pub mod postprocess;
pub mod preprocess;
pub mod session;
pub mod text_encoder;

use async_trait::async_trait;
use image::RgbImage;
use ndarray::{Array1, Array2, ArrayViewD, Axis, Ix2, Ix3};
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::Device;
use crate::vision::catalog::ModelKey;
use crate::vision::detections::Detections;
use crate::vision::hub::HubFetcher;
use crate::vision::model::{ModelError, PredictConfig, SegmentationModel, TextPrompt};
use crate::vision::model_cache::{ModelHandle, ModelLoader};

use self::session::{build_session, has_input};
use self::text_encoder::TextEncoder;

/// Where weights come from and how sessions are built
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub hub_repo: String,
    pub weights_extension: String,
    pub text_encoder_repo: String,
    pub text_encoder_file: String,
    pub tokenizer_file: String,
    pub cache_dir: Option<PathBuf>,
    pub hf_token: Option<String>,
    pub device: Device,
    pub intra_threads: usize,
}

/// Loads YOLOE ONNX exports from the hub
pub struct OnnxYoloeLoader {
    config: LoaderConfig,
    hub: HubFetcher,
    text_encoder: OnceCell<Arc<TextEncoder>>,
}

impl OnnxYoloeLoader {
    pub fn new(config: LoaderConfig) -> Result<Self, ModelError> {
        let hub = HubFetcher::new(config.cache_dir.clone(), config.hf_token.clone())?;
        Ok(Self {
            config,
            hub,
            text_encoder: OnceCell::new(),
        })
    }

    async fn shared_text_encoder(&self) -> Result<Arc<TextEncoder>, ModelError> {
        let encoder = self
            .text_encoder
            .get_or_try_init(|| async {
                let repo = &self.config.text_encoder_repo;
                let model_path = self.hub.fetch(repo, &self.config.text_encoder_file).await?;
                let tokenizer_path = self.hub.fetch(repo, &self.config.tokenizer_file).await?;
                let device = self.config.device;
                let threads = self.config.intra_threads;

                let encoder = tokio::task::spawn_blocking(move || {
                    TextEncoder::load(&model_path, &tokenizer_path, device, threads)
                })
                .await
                .map_err(|e| ModelError::Runtime(format!("Text encoder load task failed: {}", e)))??;
                Ok::<_, ModelError>(Arc::new(encoder))
            })
            .await?;
        Ok(encoder.clone())
    }
}

#[async_trait]
impl ModelLoader for OnnxYoloeLoader {
    async fn load(&self, key: &ModelKey) -> Result<ModelHandle, ModelError> {
        let filename = key.weights_filename(&self.config.weights_extension);
        let weights = self.hub.fetch(&self.config.hub_repo, &filename).await?;

        let text_encoder = if key.prompt_free {
            None
        } else {
            Some(self.shared_text_encoder().await?)
        };

        let name = key.to_string();
        let device = self.config.device;
        let threads = self.config.intra_threads;
        let model = tokio::task::spawn_blocking(move || {
            YoloeModel::load(name, &weights, text_encoder, device, threads)
        })
        .await
        .map_err(|e| ModelError::Runtime(format!("Model load task failed: {}", e)))??;

        Ok(Arc::new(model))
    }
}

/// A loaded YOLOE detector
pub struct YoloeModel {
    name: String,
    session: Mutex<Session>,
    text_encoder: Option<Arc<TextEncoder>>,
    takes_text_features: bool,
    takes_thresholds: bool,
    /// Second output present: mask prototypes
    has_prototypes: bool,
    /// Vocabulary baked into the export, used by prompt-free variants
    embedded_names: Vec<String>,
}

impl std::fmt::Debug for YoloeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloeModel")
            .field("name", &self.name)
            .field("takes_text_features", &self.takes_text_features)
            .field("takes_thresholds", &self.takes_thresholds)
            .field("has_prototypes", &self.has_prototypes)
            .field("embedded_names", &self.embedded_names.len())
            .finish_non_exhaustive()
    }
}

impl YoloeModel {
    /// Build a detector session from an ONNX export on disk
    pub fn load(
        name: String,
        weights: &Path,
        text_encoder: Option<Arc<TextEncoder>>,
        device: Device,
        intra_threads: usize,
    ) -> Result<Self, ModelError> {
        let session = build_session(weights, device, intra_threads)?;
        let takes_text_features = has_input(&session, "txt_feats");
        let takes_thresholds =
            has_input(&session, "conf_threshold") && has_input(&session, "iou_threshold");

        let has_prototypes = session.outputs.len() > 1;

        let embedded_names = session
            .metadata()
            .ok()
            .and_then(|m| m.custom("names").ok().flatten())
            .map(|raw| parse_names(&raw))
            .unwrap_or_default();

        if takes_text_features && text_encoder.is_none() {
            return Err(ModelError::Runtime(format!(
                "{} expects text features but no text encoder is available",
                name
            )));
        }

        info!(
            "🚀 {} ready (text prompts: {}, embedded classes: {})",
            name,
            takes_text_features,
            embedded_names.len()
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            text_encoder,
            takes_text_features,
            takes_thresholds,
            has_prototypes,
            embedded_names,
        })
    }
}

impl SegmentationModel for YoloeModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode_text(&self, labels: &[String]) -> Result<TextPrompt, ModelError> {
        match &self.text_encoder {
            Some(encoder) => TextPrompt::new(labels.to_vec(), encoder.encode(labels)?),
            None => TextPrompt::new(labels.to_vec(), Array2::zeros((labels.len(), 0))),
        }
    }

    fn predict(
        &self,
        image: &RgbImage,
        prompt: &TextPrompt,
        config: &PredictConfig,
    ) -> Result<Detections, ModelError> {
        let (tensor, geometry) = preprocess::letterbox(image, config.image_size)?;
        debug!(
            "{}: letterboxed {}x{} to {} (scale {:.3})",
            self.name, geometry.source_width, geometry.source_height, geometry.size, geometry.scale
        );

        let images = Value::from_array(tensor).map_err(runtime)?;
        let txt_feats = if self.takes_text_features {
            let feats = prompt.embeddings().clone().insert_axis(Axis(0));
            Some(Value::from_array(feats).map_err(runtime)?)
        } else {
            None
        };
        let conf = Value::from_array(Array1::from_elem(1, config.conf_thresh)).map_err(runtime)?;
        let iou = Value::from_array(Array1::from_elem(1, config.iou_thresh)).map_err(runtime)?;

        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());

        let outputs = match (txt_feats, self.takes_thresholds) {
            (Some(txt), true) => session.run(ort::inputs![
                "images" => images,
                "txt_feats" => txt,
                "conf_threshold" => conf,
                "iou_threshold" => iou
            ]),
            (Some(txt), false) => session.run(ort::inputs![
                "images" => images,
                "txt_feats" => txt
            ]),
            (None, true) => session.run(ort::inputs![
                "images" => images,
                "conf_threshold" => conf,
                "iou_threshold" => iou
            ]),
            (None, false) => session.run(ort::inputs!["images" => images]),
        }
        .map_err(runtime)?;

        let rows = outputs[0].try_extract_array::<f32>().map_err(runtime)?;
        let rows = first_batch(&rows, "detections")?
            .into_dimensionality::<Ix2>()
            .map_err(|e| ModelError::InvalidOutput(format!("detections: {}", e)))?;

        let protos = if self.has_prototypes {
            Some(outputs[1].try_extract_array::<f32>().map_err(runtime)?)
        } else {
            None
        };
        let protos = match protos.as_ref() {
            Some(p) => Some(
                first_batch(p, "prototypes")?
                    .into_dimensionality::<Ix3>()
                    .map_err(|e| ModelError::InvalidOutput(format!("prototypes: {}", e)))?,
            ),
            None => None,
        };

        let naming;
        let names = if self.takes_text_features {
            prompt
        } else {
            naming = TextPrompt::new(
                self.embedded_names.clone(),
                Array2::zeros((self.embedded_names.len(), 0)),
            )?;
            &naming
        };

        postprocess::decode(rows, protos, &geometry, config.conf_thresh, names)
    }
}

/// First batch entry of a graph output, or an error for scalar and empty outputs
fn first_batch<'a>(
    output: &'a ArrayViewD<'_, f32>,
    what: &str,
) -> Result<ArrayViewD<'a, f32>, ModelError> {
    if output.ndim() == 0 || output.shape()[0] == 0 {
        return Err(ModelError::InvalidOutput(format!(
            "{}: expected a batch dimension, got shape {:?}",
            what,
            output.shape()
        )));
    }
    Ok(output.index_axis(Axis(0), 0))
}

fn runtime<E: std::fmt::Display>(e: E) -> ModelError {
    ModelError::Runtime(e.to_string())
}

/// Parse the `names` metadata entry of an export, e.g. `{0: 'person', 1: 'car'}`
pub fn parse_names(raw: &str) -> Vec<String> {
    let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
    let mut entries: Vec<(usize, String)> = Vec::new();
    let mut rest = body;

    while let Some(colon) = rest.find(':') {
        let Ok(index) = rest[..colon].trim().trim_start_matches(',').trim().parse::<usize>()
        else {
            break;
        };
        let value = rest[colon + 1..].trim_start();
        let Some(quote) = value.chars().next().filter(|c| *c == '\'' || *c == '"') else {
            break;
        };
        let Some(end) = value[1..].find(quote) else {
            break;
        };
        entries.push((index, value[1..1 + end].to_string()));
        rest = &value[end + 2..];
    }

    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, name)| name).collect()
}
