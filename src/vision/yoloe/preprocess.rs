// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Letterbox preprocessing for the detector graph

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

use crate::vision::model::ModelError;

/// Gray level used for letterbox padding
pub const PAD_VALUE: u8 = 114;

/// Network stride; inference sizes are rounded up to a multiple of it
pub const STRIDE: u32 = 32;

/// Largest accepted inference size after stride alignment
pub const MAX_IMAGE_SIZE: u32 = 4096;

/// Geometry needed to map letterboxed coordinates back to the source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Square input side in pixels
    pub size: u32,
    /// Resize ratio applied to the source image
    pub scale: f32,
    /// Left padding in pixels
    pub pad_x: f32,
    /// Top padding in pixels
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    /// Map a box from letterboxed space to source pixels, clipped to the image
    pub fn unmap_box(&self, b: [f32; 4]) -> [f32; 4] {
        let w = self.source_width as f32;
        let h = self.source_height as f32;
        [
            ((b[0] - self.pad_x) / self.scale).clamp(0.0, w),
            ((b[1] - self.pad_y) / self.scale).clamp(0.0, h),
            ((b[2] - self.pad_x) / self.scale).clamp(0.0, w),
            ((b[3] - self.pad_y) / self.scale).clamp(0.0, h),
        ]
    }
}

/// Round a requested size up to the network stride
///
/// Returns `None` when the aligned size would overflow `u32`.
pub fn aligned_size(image_size: u32) -> Option<u32> {
    image_size.max(STRIDE).div_ceil(STRIDE).checked_mul(STRIDE)
}

/// Resize with preserved aspect ratio into a padded square and build the NCHW tensor
///
/// # Returns
/// The `[1, 3, S, S]` input tensor scaled to `0..1` and its letterbox geometry
///
/// # Errors
/// `ModelError::Runtime` when the aligned size exceeds [`MAX_IMAGE_SIZE`];
/// nothing is allocated in that case
pub fn letterbox(
    image: &RgbImage,
    image_size: u32,
) -> Result<(Array4<f32>, Letterbox), ModelError> {
    let size = aligned_size(image_size)
        .filter(|size| *size <= MAX_IMAGE_SIZE)
        .ok_or_else(|| {
            ModelError::Runtime(format!(
                "image_size {} exceeds the maximum of {}",
                image_size, MAX_IMAGE_SIZE
            ))
        })?;
    let (src_w, src_h) = image.dimensions();

    let scale = (size as f32 / src_w.max(1) as f32).min(size as f32 / src_h.max(1) as f32);
    let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, size);

    let dw = (size - new_w) as f32 / 2.0;
    let dh = (size - new_h) as f32 / 2.0;
    let left = (dw - 0.1).round().max(0.0) as u32;
    let top = (dh - 0.1).round().max(0.0) as u32;

    let resized = if (new_w, new_h) == (src_w, src_h) {
        image.clone()
    } else {
        image::imageops::resize(image, new_w, new_h, FilterType::Triangle)
    };

    let pad = PAD_VALUE as f32 / 255.0;
    let side = size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), pad);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + left) as usize;
        let ty = (y + top) as usize;
        if tx >= side || ty >= side {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
        }
    }

    let geometry = Letterbox {
        size,
        scale,
        pad_x: left as f32,
        pad_y: top as f32,
        source_width: src_w,
        source_height: src_h,
    };
    Ok((tensor, geometry))
}
