// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoding of the detector graph output
//!
//! The graph emits rows `x1, y1, x2, y2, score, class, coeff[M]` in
//! letterboxed pixel space with suppression already applied, plus mask
//! prototypes of shape `[M, Hp, Wp]`.

use image::{GrayImage, Luma};
use ndarray::{ArrayView2, ArrayView3, Axis};

use super::preprocess::Letterbox;
use crate::vision::detections::{DataColumn, Detections};
use crate::vision::model::{ModelError, TextPrompt};

const BOX_FIELDS: usize = 6;

/// Turn raw graph rows and prototypes into source-space detections
///
/// Rows scoring below `conf_thresh` are dropped. Class ids outside the
/// prompt's label range get an empty `class_name`.
pub fn decode(
    rows: ArrayView2<f32>,
    protos: Option<ArrayView3<f32>>,
    geometry: &Letterbox,
    conf_thresh: f32,
    prompt: &TextPrompt,
) -> Result<Detections, ModelError> {
    if rows.ncols() < BOX_FIELDS {
        return Err(ModelError::InvalidOutput(format!(
            "detection rows have {} columns, expected at least {}",
            rows.ncols(),
            BOX_FIELDS
        )));
    }
    let num_coeffs = rows.ncols() - BOX_FIELDS;
    let protos = match protos {
        Some(p) if num_coeffs > 0 => {
            if p.shape()[0] != num_coeffs {
                return Err(ModelError::InvalidOutput(format!(
                    "{} mask coefficients but {} prototypes",
                    num_coeffs,
                    p.shape()[0]
                )));
            }
            Some(p)
        }
        _ => None,
    };

    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    let mut classes = Vec::new();
    let mut names = Vec::new();
    let mut masks = Vec::new();

    for row in rows.axis_iter(Axis(0)) {
        let score = row[4];
        if !score.is_finite() || score < conf_thresh {
            continue;
        }
        let class_id = row[5].round() as i64;
        let bbox = geometry.unmap_box([row[0], row[1], row[2], row[3]]);

        if let Some(protos) = protos.as_ref() {
            let coeffs: Vec<f32> = row.iter().skip(BOX_FIELDS).copied().collect();
            masks.push(decode_mask(&coeffs, protos, geometry, &bbox));
        }

        boxes.push(bbox);
        scores.push(score);
        classes.push(class_id);
        names.push(prompt.label(class_id).unwrap_or_default().to_string());
    }

    let mut detections = Detections::new(boxes)
        .with_confidence(scores)?
        .with_class_id(classes)?
        .with_data("class_name", DataColumn::Str(names))?;
    if protos.is_some() {
        detections = detections.with_mask(masks)?;
    }
    Ok(detections)
}

/// Rasterise one instance mask at source resolution
///
/// Pixels outside the box stay empty. Each source pixel samples the nearest
/// prototype cell; `sigmoid(logit) > 0.5` is tested as `logit > 0`.
fn decode_mask(
    coeffs: &[f32],
    protos: &ArrayView3<f32>,
    geometry: &Letterbox,
    bbox: &[f32; 4],
) -> GrayImage {
    let (_, proto_h, proto_w) = protos.dim();
    let mut mask = GrayImage::new(geometry.source_width, geometry.source_height);
    if proto_h == 0 || proto_w == 0 {
        return mask;
    }

    let x_start = bbox[0].floor().max(0.0) as u32;
    let y_start = bbox[1].floor().max(0.0) as u32;
    let x_end = (bbox[2].ceil() as u32).min(geometry.source_width);
    let y_end = (bbox[3].ceil() as u32).min(geometry.source_height);

    let step_x = proto_w as f32 / geometry.size as f32;
    let step_y = proto_h as f32 / geometry.size as f32;

    for y in y_start..y_end {
        let ly = (y as f32 + 0.5) * geometry.scale + geometry.pad_y;
        let py = ((ly * step_y) as usize).min(proto_h - 1);
        for x in x_start..x_end {
            let lx = (x as f32 + 0.5) * geometry.scale + geometry.pad_x;
            let px = ((lx * step_x) as usize).min(proto_w - 1);

            let logit: f32 = coeffs
                .iter()
                .enumerate()
                .map(|(m, c)| c * protos[[m, py, px]])
                .sum();
            if logit > 0.0 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
    mask
}
