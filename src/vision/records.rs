// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire-format detection records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::detections::Detections;

/// One detected object as serialized in API responses
///
/// Absent columns serialize as `null`. Extra named channels from the
/// detections container are flattened next to the standard fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// `[x_min, y_min, x_max, y_max]` in source image pixels
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub confidence: Option<f32>,
    pub class_id: Option<i64>,
    pub tracker_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Convert a detections container into records, one per detection, in emitted order
pub fn to_records(detections: &Detections) -> Vec<DetectionRecord> {
    let confidence = detections.confidence();
    let class_id = detections.class_id();
    let tracker_id = detections.tracker_id();

    detections
        .xyxy()
        .iter()
        .enumerate()
        .map(|(i, bbox)| {
            let extra = detections
                .data()
                .iter()
                .map(|(name, column)| (name.clone(), column.value_at(i)))
                .collect();

            DetectionRecord {
                bbox: *bbox,
                confidence: confidence.map(|c| c[i]),
                class_id: class_id.map(|c| c[i]),
                tracker_id: tracker_id.map(|t| t[i]),
                extra,
            }
        })
        .collect()
}
