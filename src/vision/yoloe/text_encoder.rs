// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! CLIP-style text encoder for open-vocabulary prompts
//!
//! Labels are tokenized to a fixed context length, embedded by an ONNX
//! graph and L2-normalized. Embeddings are memoized per label.

use lru::LruCache;
use ndarray::{Array2, ArrayView1};
use ort::session::Session;
use ort::value::Value;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::session::{build_session, has_input};
use crate::config::Device;
use crate::vision::model::ModelError;

/// Token sequence length expected by the encoder graph
pub const CONTEXT_LENGTH: usize = 77;

const EMBEDDING_CACHE_SIZE: usize = 1024;

/// Text encoder shared by every loaded detector
pub struct TextEncoder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    uses_attention_mask: bool,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl std::fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEncoder")
            .field("uses_attention_mask", &self.uses_attention_mask)
            .finish_non_exhaustive()
    }
}

impl TextEncoder {
    /// Load the encoder graph and its tokenizer from disk
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        device: Device,
        intra_threads: usize,
    ) -> Result<Self, ModelError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            ModelError::TextEncoding(format!(
                "Failed to load tokenizer {}: {}",
                tokenizer_path.display(),
                e
            ))
        })?;
        let session = build_session(model_path, device, intra_threads)?;
        let uses_attention_mask = has_input(&session, "attention_mask");
        info!("✅ Text encoder loaded from {}", model_path.display());

        let capacity = NonZeroUsize::new(EMBEDDING_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            uses_attention_mask,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Embed `labels`, one normalized row per label in input order
    pub fn encode(&self, labels: &[String]) -> Result<Array2<f32>, ModelError> {
        let mut rows: Vec<Option<Vec<f32>>> = {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            labels.iter().map(|l| cache.get(l).cloned()).collect()
        };

        let missing: Vec<usize> = (0..labels.len()).filter(|&i| rows[i].is_none()).collect();
        if !missing.is_empty() {
            debug!("Encoding {} uncached labels", missing.len());
            let texts: Vec<&str> = missing.iter().map(|&i| labels[i].as_str()).collect();
            let embedded = self.run(&texts)?;

            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            for (row, &i) in embedded.into_iter().zip(&missing) {
                cache.put(labels[i].clone(), row.clone());
                rows[i] = Some(row);
            }
        }

        let rows: Vec<Vec<f32>> = rows.into_iter().flatten().collect();
        let dim = rows.first().map_or(0, Vec::len);
        if rows.len() != labels.len() || rows.iter().any(|r| r.len() != dim) {
            return Err(ModelError::TextEncoding(
                "inconsistent embedding dimensions".to_string(),
            ));
        }
        Array2::from_shape_vec((rows.len(), dim), rows.concat())
            .map_err(|e| ModelError::TextEncoding(e.to_string()))
    }

    fn run(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        let (ids, mask) = self.tokenize(texts)?;

        let ids = Value::from_array(ids).map_err(|e| ModelError::Runtime(e.to_string()))?;
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());

        let outputs = if self.uses_attention_mask {
            let mask = Value::from_array(mask).map_err(|e| ModelError::Runtime(e.to_string()))?;
            session.run(ort::inputs!["input_ids" => ids, "attention_mask" => mask])
        } else {
            session.run(ort::inputs!["input_ids" => ids])
        }
        .map_err(|e| ModelError::Runtime(e.to_string()))?;

        let embeddings = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| ModelError::Runtime(e.to_string()))?;
        let shape = embeddings.shape().to_vec();
        if shape.len() != 2 || shape[0] != texts.len() {
            return Err(ModelError::TextEncoding(format!(
                "unexpected encoder output shape {:?}",
                shape
            )));
        }

        Ok(embeddings
            .outer_iter()
            .map(|row| l2_normalize(row.into_dimensionality().ok()))
            .collect())
    }

    fn tokenize(&self, texts: &[&str]) -> Result<(Array2<i64>, Array2<i64>), ModelError> {
        let mut ids = Array2::<i64>::zeros((texts.len(), CONTEXT_LENGTH));
        let mut mask = Array2::<i64>::zeros((texts.len(), CONTEXT_LENGTH));

        for (i, text) in texts.iter().enumerate() {
            let encoding = self
                .tokenizer
                .encode(*text, true)
                .map_err(|e| ModelError::TextEncoding(format!("Tokenization failed: {}", e)))?;
            for (j, &id) in encoding.get_ids().iter().take(CONTEXT_LENGTH).enumerate() {
                ids[[i, j]] = id as i64;
                mask[[i, j]] = 1;
            }
        }
        Ok((ids, mask))
    }
}

fn l2_normalize(row: Option<ArrayView1<f32>>) -> Vec<f32> {
    let Some(row) = row else {
        return Vec::new();
    };
    let norm = row.dot(&row).sqrt();
    if norm > 0.0 {
        row.iter().map(|v| v / norm).collect()
    } else {
        row.to_vec()
    }
}
