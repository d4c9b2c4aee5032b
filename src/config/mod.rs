// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration from command-line flags and environment variables

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::version::API_DESCRIPTION;
use crate::vision::catalog::{DEFAULT_HUB_REPO, DEFAULT_WEIGHTS_EXTENSION};
use crate::vision::yoloe::LoaderConfig;

/// Execution device for ONNX Runtime sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Device {
    /// CUDA when available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// YOLOE API server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "yoloe-api", version, about = API_DESCRIPTION)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[arg(long, env = "YOLOE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "YOLOE_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Hub repository holding the segmentation weights
    #[arg(long, env = "YOLOE_HUB_REPO", default_value = DEFAULT_HUB_REPO)]
    pub hub_repo: String,

    /// Extension of the weight artifacts in the hub repository
    #[arg(long, env = "YOLOE_WEIGHTS_EXT", default_value = DEFAULT_WEIGHTS_EXTENSION)]
    pub weights_extension: String,

    /// Hub repository holding the text encoder and tokenizer (defaults to --hub-repo)
    #[arg(long, env = "YOLOE_TEXT_ENCODER_REPO")]
    pub text_encoder_repo: Option<String>,

    /// Text encoder ONNX file name
    #[arg(long, env = "YOLOE_TEXT_ENCODER_FILE", default_value = "text_encoder.onnx")]
    pub text_encoder_file: String,

    /// Tokenizer file name
    #[arg(long, env = "YOLOE_TOKENIZER_FILE", default_value = "tokenizer.json")]
    pub tokenizer_file: String,

    /// Local directory for downloaded artifacts (defaults to the hub cache)
    #[arg(long, env = "YOLOE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Hugging Face access token
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Execution device
    #[arg(long, env = "YOLOE_DEVICE", value_enum, default_value_t = Device::Auto)]
    pub device: Device,

    /// Threads used within a single ONNX operator
    #[arg(long, env = "YOLOE_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Maximum request body size in bytes
    #[arg(long, env = "YOLOE_MAX_UPLOAD_BYTES", default_value_t = 32 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Model ids to load before accepting requests (comma-separated)
    #[arg(long, env = "YOLOE_PRELOAD", value_delimiter = ',')]
    pub preload: Vec<String>,
}

impl ServerConfig {
    /// Socket address built from host and port
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address '{}': {}", addr, e))
    }

    /// Settings for the ONNX model loader
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            hub_repo: self.hub_repo.clone(),
            weights_extension: self.weights_extension.clone(),
            text_encoder_repo: self
                .text_encoder_repo
                .clone()
                .unwrap_or_else(|| self.hub_repo.clone()),
            text_encoder_file: self.text_encoder_file.clone(),
            tokenizer_file: self.tokenizer_file.clone(),
            cache_dir: self.cache_dir.clone(),
            hf_token: self.hf_token.clone(),
            device: self.device,
            intra_threads: self.intra_threads,
        }
    }
}
