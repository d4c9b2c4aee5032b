// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod predict;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{ModelsResponse, RootResponse};
pub use http_server::{create_app, start_server, AppState};
pub use predict::{predict_text_handler, PredictResponse, PredictionResult, TextPredictRequest};
