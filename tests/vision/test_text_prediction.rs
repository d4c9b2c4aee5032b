// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text prediction pipeline tests against a stub model
//!
//! Labels travel with each call, so requests with different label sets
//! sharing one model must not see each other's classes.

use bytes::Bytes;
use std::sync::Arc;
use yoloe_api::{
    api::predict::{run_text_prediction, TextPredictRequest, UploadedImage},
    vision::{PredictConfig, SegmentationModel},
};

use crate::common::{make_jpeg, StubModel};

fn request(labels: &[&str], return_image: bool) -> TextPredictRequest {
    TextPredictRequest {
        images: vec![UploadedImage {
            filename: "frame.jpg".to_string(),
            content: Bytes::from(make_jpeg(48, 32)),
        }],
        labels: labels.iter().map(|s| s.to_string()).collect(),
        model_id: "yoloe-11l".to_string(),
        config: PredictConfig::default(),
        return_image,
    }
}

#[cfg(test)]
mod text_prediction_tests {
    use super::*;

    /// Test 1: Records carry the label of their class id
    #[test]
    fn test_class_names_follow_labels() {
        let model = StubModel::new("stub");
        let response = run_text_prediction(&model, &request(&["bus", "bike"], false)).unwrap();

        let detections = &response.results[0].detections;
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, Some(0));
        assert_eq!(detections[0].extra["class_name"], "bus");
        assert_eq!(detections[1].extra["class_name"], "bike");
        assert!(response.results[0].image_base64.is_none());
    }

    /// Test 2: Interleaved label sets on one shared model stay separate
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_label_sets() {
        let model: Arc<dyn SegmentationModel> = Arc::new(StubModel::new("shared"));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let model = model.clone();
            let labels: Vec<&str> = if i % 2 == 0 {
                vec!["cat"]
            } else {
                vec!["dog", "bird", "fish"]
            };
            let req = request(&labels, false);
            tasks.push(tokio::task::spawn_blocking(move || {
                let response = run_text_prediction(model.as_ref(), &req).unwrap();
                (i, response)
            }));
        }

        for task in tasks {
            let (i, response) = task.await.unwrap();
            let names: Vec<String> = response.results[0]
                .detections
                .iter()
                .map(|d| d.extra["class_name"].as_str().unwrap().to_string())
                .collect();
            if i % 2 == 0 {
                assert_eq!(names, vec!["cat"]);
            } else {
                assert_eq!(names, vec!["dog", "bird", "fish"]);
            }
        }
    }

    /// Test 3: Annotated image is returned as base64 PNG
    #[test]
    fn test_annotated_image_returned() {
        let model = StubModel::new("stub");
        let response = run_text_prediction(&model, &request(&["cat"], true)).unwrap();
        let encoded = response.results[0].image_base64.as_ref().unwrap();
        assert!(encoded.starts_with("iVBORw0KGgo"));
    }
}
