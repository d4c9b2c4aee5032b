// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-image detections container
//!
//! Columns are stored in parallel: entry `i` of every present column belongs
//! to the box at `xyxy[i]`. The builder methods reject columns whose length
//! differs from the number of boxes.

use image::GrayImage;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// A column's length disagrees with the number of boxes
#[derive(Debug, Clone, PartialEq, Error)]
#[error("column '{column}' has {actual} entries, expected {expected}")]
pub struct ColumnLengthMismatch {
    pub column: String,
    pub expected: usize,
    pub actual: usize,
}

/// Extra named per-detection channel carried alongside the standard columns
#[derive(Debug, Clone, PartialEq)]
pub enum DataColumn {
    Str(Vec<String>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    FloatArray(Vec<Vec<f64>>),
}

impl DataColumn {
    pub fn len(&self) -> usize {
        match self {
            DataColumn::Str(v) => v.len(),
            DataColumn::Int(v) => v.len(),
            DataColumn::Float(v) => v.len(),
            DataColumn::FloatArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON value of entry `index`; array entries become plain lists
    pub fn value_at(&self, index: usize) -> Value {
        match self {
            DataColumn::Str(v) => v.get(index).map_or(Value::Null, |s| Value::from(s.as_str())),
            DataColumn::Int(v) => v.get(index).map_or(Value::Null, |n| Value::from(*n)),
            DataColumn::Float(v) => v.get(index).map_or(Value::Null, |f| Value::from(*f)),
            DataColumn::FloatArray(v) => v
                .get(index)
                .map_or(Value::Null, |row| Value::from(row.clone())),
        }
    }
}

/// Detections found in one image
#[derive(Debug, Clone, Default)]
pub struct Detections {
    xyxy: Vec<[f32; 4]>,
    mask: Option<Vec<GrayImage>>,
    confidence: Option<Vec<f32>>,
    class_id: Option<Vec<i64>>,
    tracker_id: Option<Vec<i64>>,
    data: BTreeMap<String, DataColumn>,
}

impl Detections {
    /// Create a container holding only boxes in `[x_min, y_min, x_max, y_max]` form
    pub fn new(xyxy: Vec<[f32; 4]>) -> Self {
        Self {
            xyxy,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn check_len(&self, column: &str, actual: usize) -> Result<(), ColumnLengthMismatch> {
        if actual != self.xyxy.len() {
            return Err(ColumnLengthMismatch {
                column: column.to_string(),
                expected: self.xyxy.len(),
                actual,
            });
        }
        Ok(())
    }

    pub fn with_confidence(mut self, confidence: Vec<f32>) -> Result<Self, ColumnLengthMismatch> {
        self.check_len("confidence", confidence.len())?;
        self.confidence = Some(confidence);
        Ok(self)
    }

    pub fn with_class_id(mut self, class_id: Vec<i64>) -> Result<Self, ColumnLengthMismatch> {
        self.check_len("class_id", class_id.len())?;
        self.class_id = Some(class_id);
        Ok(self)
    }

    pub fn with_tracker_id(mut self, tracker_id: Vec<i64>) -> Result<Self, ColumnLengthMismatch> {
        self.check_len("tracker_id", tracker_id.len())?;
        self.tracker_id = Some(tracker_id);
        Ok(self)
    }

    /// Attach full-resolution binary masks (non-zero pixels belong to the object)
    pub fn with_mask(mut self, mask: Vec<GrayImage>) -> Result<Self, ColumnLengthMismatch> {
        self.check_len("mask", mask.len())?;
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn with_data(
        mut self,
        name: impl Into<String>,
        column: DataColumn,
    ) -> Result<Self, ColumnLengthMismatch> {
        let name = name.into();
        self.check_len(&name, column.len())?;
        self.data.insert(name, column);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.xyxy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xyxy.is_empty()
    }

    pub fn xyxy(&self) -> &[[f32; 4]] {
        &self.xyxy
    }

    pub fn mask(&self) -> Option<&[GrayImage]> {
        self.mask.as_deref()
    }

    pub fn confidence(&self) -> Option<&[f32]> {
        self.confidence.as_deref()
    }

    pub fn class_id(&self) -> Option<&[i64]> {
        self.class_id.as_deref()
    }

    pub fn tracker_id(&self) -> Option<&[i64]> {
        self.tracker_id.as_deref()
    }

    pub fn data(&self) -> &BTreeMap<String, DataColumn> {
        &self.data
    }

    /// Box areas in square pixels, in detection order
    pub fn box_area(&self) -> Vec<f32> {
        self.xyxy
            .iter()
            .map(|b| (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0))
            .collect()
    }

    /// Object areas: mask pixel counts when masks are present, box areas otherwise
    pub fn area(&self) -> Vec<f32> {
        match &self.mask {
            Some(masks) => masks
                .iter()
                .map(|m| m.pixels().filter(|p| p.0[0] > 0).count() as f32)
                .collect(),
            None => self.box_area(),
        }
    }
}
