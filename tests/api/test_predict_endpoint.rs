// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Text-prompted prediction endpoint tests for POST /api/predict/text
//!
//! These tests verify that:
//! - One result is returned per uploaded image, in upload order
//! - Detections follow the record wire format
//! - `return_image` controls the annotated PNG
//! - Missing fields map to 422, undecodable uploads and unknown models to 500
//! - Models are loaded once and reused across requests

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tower::util::ServiceExt;

use crate::common::{make_jpeg, test_app, test_app_with_limit, MultipartBody};

fn predict_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/predict/text")
        .header(header::CONTENT_TYPE, MultipartBody::content_type())
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[cfg(test)]
mod predict_endpoint_tests {
    use super::*;
    use base64::Engine as _;

    /// Test 1: JPEG without annotated image
    #[tokio::test]
    async fn test_predict_without_image() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "street.jpg", "image/jpeg", &make_jpeg(64, 48))
            .text("texts", "person, car")
            .text("return_image", "false")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let results = json["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["filename"], "street.jpg");
        assert!(results[0].get("image_base64").is_none());

        let detections = results[0]["detections"].as_array().unwrap();
        assert_eq!(detections.len(), 2);
        for (i, detection) in detections.iter().enumerate() {
            assert_eq!(detection["box"].as_array().unwrap().len(), 4);
            assert_eq!(detection["class_id"], i as i64);
            assert!(detection["confidence"].is_number());
            assert!(detection["tracker_id"].is_null());
        }
        assert_eq!(detections[0]["class_name"], "person");
        assert_eq!(detections[1]["class_name"], "car");
    }

    /// Test 2: Annotated PNG has the input dimensions
    #[tokio::test]
    async fn test_predict_with_image() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "a.jpg", "image/jpeg", &make_jpeg(80, 60))
            .text("texts", "dog")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        let encoded = json["results"][0]["image_base64"].as_str().unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 60));
    }

    /// Test 3: Multiple images keep upload order
    #[tokio::test]
    async fn test_results_follow_upload_order() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "first.jpg", "image/jpeg", &make_jpeg(32, 32))
            .file("images", "second.jpg", "image/jpeg", &make_jpeg(40, 20))
            .text("texts", "cat")
            .text("return_image", "0")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        let json = body_json(response).await;
        let names: Vec<&str> = json["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["filename"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["first.jpg", "second.jpg"]);
    }

    /// Test 4: Empty labels between commas are kept
    #[tokio::test]
    async fn test_empty_labels_are_kept() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "a.jpg", "image/jpeg", &make_jpeg(32, 32))
            .text("texts", "cat,,dog")
            .text("return_image", "false")
            .finish();

        let json = body_json(app.oneshot(predict_request(body)).await.unwrap()).await;
        let detections = json["results"][0]["detections"].as_array().unwrap();
        assert_eq!(detections.len(), 3);
        assert_eq!(detections[1]["class_name"], "");
    }

    /// Test 5: Missing texts is a validation error
    #[tokio::test]
    async fn test_missing_texts_returns_422() {
        let (app, _, loader) = test_app();
        let body = MultipartBody::new()
            .file("images", "a.jpg", "image/jpeg", &make_jpeg(16, 16))
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = body_json(response).await;
        assert_eq!(json["field"], "texts");
        assert_eq!(loader.calls(), 0);
    }

    /// Test 6: Missing images is a validation error
    #[tokio::test]
    async fn test_missing_images_returns_422() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new().text("texts", "cat").finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    /// Test 7: Unparsable scalar is a validation error
    #[tokio::test]
    async fn test_bad_image_size_returns_422() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "a.jpg", "image/jpeg", &make_jpeg(16, 16))
            .text("texts", "cat")
            .text("image_size", "large")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    /// Test 8: Undecodable upload fails the request with a detail message
    #[tokio::test]
    async fn test_undecodable_image_returns_500() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "notes.txt", "text/plain", b"this is not an image")
            .text("texts", "cat")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("Unsupported image format"));
    }

    /// Test 9: One bad image aborts the whole batch
    #[tokio::test]
    async fn test_bad_image_aborts_batch() {
        let (app, _, _) = test_app();
        let body = MultipartBody::new()
            .file("images", "good.jpg", "image/jpeg", &make_jpeg(16, 16))
            .file("images", "bad.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0x00, 0x01])
            .text("texts", "cat")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Test 10: Unknown model id is rejected without loading anything
    #[tokio::test]
    async fn test_unknown_model_returns_500() {
        let (app, cache, loader) = test_app();
        let body = MultipartBody::new()
            .file("images", "a.jpg", "image/jpeg", &make_jpeg(16, 16))
            .text("texts", "cat")
            .text("model_id", "yolov8n")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("yolov8n"));
        assert_eq!(loader.calls(), 0);
        assert!(cache.loaded_keys().is_empty());
    }

    /// Test 11: Repeated requests reuse the loaded model
    #[tokio::test]
    async fn test_model_loaded_once_across_requests() {
        let (app, cache, loader) = test_app();

        for _ in 0..3 {
            let body = MultipartBody::new()
                .file("images", "a.jpg", "image/jpeg", &make_jpeg(16, 16))
                .text("texts", "cat")
                .text("model_id", "yoloe-11s")
                .text("return_image", "false")
                .finish();
            let response = app.clone().oneshot(predict_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(loader.calls(), 1);
        assert_eq!(cache.loaded_keys().len(), 1);
        assert_eq!(cache.loaded_keys()[0].to_string(), "yoloe-11s_false");
    }

    /// Test 12: Malformed multipart body is a bad request
    #[tokio::test]
    async fn test_malformed_multipart_returns_400() {
        let (app, _, _) = test_app();
        let body = b"--yoloe-test-boundary\r\nContent-Disposition: form-data; name=\"texts\"\r\n\r\ncat".to_vec();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Test 13: Body over the configured limit is rejected before any model load
    #[tokio::test]
    async fn test_oversized_upload_returns_400() {
        let (app, cache, loader) = test_app_with_limit(1024);
        let body = MultipartBody::new()
            .text("texts", "cat")
            .file("images", "big.jpg", "image/jpeg", &[0u8; 8 * 1024])
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error_type"], "invalid_request");
        assert!(!json["detail"].as_str().unwrap().is_empty());
        assert_eq!(loader.calls(), 0);
        assert!(cache.loaded_keys().is_empty());
    }

    /// Test 14: Body under the configured limit is accepted
    #[tokio::test]
    async fn test_upload_within_limit_is_accepted() {
        let jpeg = make_jpeg(32, 32);
        let (app, _, _) = test_app_with_limit(jpeg.len() + 4096);
        let body = MultipartBody::new()
            .file("images", "small.jpg", "image/jpeg", &jpeg)
            .text("texts", "cat")
            .text("return_image", "false")
            .finish();

        let response = app.oneshot(predict_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
