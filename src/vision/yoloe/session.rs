// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction with device selection

use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Device;
use crate::vision::model::ModelError;

fn runtime_err<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> ModelError {
    move |e| ModelError::Runtime(format!("{}: {}", context, e))
}

fn build_cuda(path: &Path, intra_threads: usize) -> Result<Session, ModelError> {
    Session::builder()
        .map_err(runtime_err("Failed to create session builder"))?
        .with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
        .map_err(runtime_err("Failed to set CUDA execution provider"))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(runtime_err("Failed to set optimization level"))?
        .with_intra_threads(intra_threads)
        .map_err(runtime_err("Failed to set intra threads"))?
        .commit_from_file(path)
        .map_err(|e| ModelError::Runtime(format!("Failed to load {}: {}", path.display(), e)))
}

fn build_cpu(path: &Path, intra_threads: usize) -> Result<Session, ModelError> {
    Session::builder()
        .map_err(runtime_err("Failed to create session builder"))?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .map_err(runtime_err("Failed to set CPU execution provider"))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(runtime_err("Failed to set optimization level"))?
        .with_intra_threads(intra_threads)
        .map_err(runtime_err("Failed to set intra threads"))?
        .commit_from_file(path)
        .map_err(|e| ModelError::Runtime(format!("Failed to load {}: {}", path.display(), e)))
}

/// Build an inference session for the ONNX graph at `path`
///
/// With [`Device::Auto`] CUDA is tried first and CPU is used when the CUDA
/// provider cannot be registered.
pub fn build_session(path: &Path, device: Device, intra_threads: usize) -> Result<Session, ModelError> {
    match device {
        Device::Cpu => build_cpu(path, intra_threads),
        Device::Cuda => {
            let session = build_cuda(path, intra_threads)?;
            info!("✅ CUDA session ready for {}", path.display());
            Ok(session)
        }
        Device::Auto => match build_cuda(path, intra_threads) {
            Ok(session) => {
                info!("✅ CUDA session ready for {}", path.display());
                Ok(session)
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider unavailable: {}", e);
                warn!("   Falling back to CPU execution provider");
                build_cpu(path, intra_threads)
            }
        },
    }
}

/// Whether the graph declares an input called `name`
pub fn has_input(session: &Session, name: &str) -> bool {
    session.inputs.iter().any(|input| input.name == name)
}
