// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Supported YOLOE variants and weight naming

use std::fmt;

/// Model identifiers the service will load, in listing order
pub const SUPPORTED_MODELS: [&str; 6] = [
    "yoloe-v8s",
    "yoloe-v8m",
    "yoloe-v8l",
    "yoloe-11s",
    "yoloe-11m",
    "yoloe-11l",
];

/// Model used when a request does not name one
pub const DEFAULT_MODEL_ID: &str = "yoloe-11l";

/// Hub repository holding the segmentation weights
pub const DEFAULT_HUB_REPO: &str = "jameslahm/yoloe";

/// Default weight artifact extension
pub const DEFAULT_WEIGHTS_EXTENSION: &str = "onnx";

pub fn is_supported(model_id: &str) -> bool {
    SUPPORTED_MODELS.contains(&model_id)
}

/// Cache key for a loaded model instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKey {
    pub model_id: String,
    pub prompt_free: bool,
}

impl ModelKey {
    pub fn new(model_id: impl Into<String>, prompt_free: bool) -> Self {
        Self {
            model_id: model_id.into(),
            prompt_free,
        }
    }

    /// Check the identifier against the catalog
    ///
    /// # Returns
    /// * `Ok(())` - If the model id is one of [`SUPPORTED_MODELS`]
    /// * `Err(String)` - The offending id otherwise
    pub fn validate(&self) -> Result<(), String> {
        if is_supported(&self.model_id) {
            Ok(())
        } else {
            Err(self.model_id.clone())
        }
    }

    /// File name of the weight artifact inside the hub repository
    ///
    /// Prompt-free variants carry a `-pf` suffix, e.g. `yoloe-11l-seg-pf.onnx`.
    pub fn weights_filename(&self, extension: &str) -> String {
        let suffix = if self.prompt_free { "-seg-pf" } else { "-seg" };
        format!("{}{}.{}", self.model_id, suffix, extension)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.model_id, self.prompt_free)
    }
}
