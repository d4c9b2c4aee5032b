// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated image rendering
//!
//! Draws translucent mask overlays followed by box outlines. Colors are
//! looked up by detection index in a fixed palette.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::detections::Detections;

/// Blend weight of the mask color layer
pub const MASK_OPACITY: f32 = 0.4;

const PALETTE: [[u8; 3]; 21] = [
    [0xA3, 0x51, 0xFB],
    [0xFF, 0x40, 0x40],
    [0xFF, 0xA1, 0xA0],
    [0xFF, 0x76, 0x33],
    [0xFF, 0xB6, 0x33],
    [0xD1, 0xD4, 0x35],
    [0x4C, 0xFB, 0x12],
    [0x94, 0xCF, 0x1A],
    [0x40, 0xDE, 0x8A],
    [0x1B, 0x96, 0x40],
    [0x00, 0xD6, 0xC1],
    [0x2E, 0x9C, 0xAA],
    [0x00, 0xC4, 0xFF],
    [0x36, 0x47, 0x97],
    [0x66, 0x75, 0xFF],
    [0x00, 0x19, 0xEF],
    [0x86, 0x3A, 0xFF],
    [0x53, 0x00, 0x87],
    [0xCD, 0x3A, 0xFF],
    [0xFF, 0x97, 0xCA],
    [0xFF, 0x39, 0xC9],
];

/// Box outline width for an image of the given size
pub fn optimal_line_thickness(width: u32, height: u32) -> u32 {
    if width.min(height) < 1080 {
        2
    } else {
        4
    }
}

/// Label text scale for an image of the given size
///
/// Reserved for label rendering; [`render`] draws masks and boxes only.
pub fn optimal_text_scale(width: u32, height: u32) -> f32 {
    width.min(height) as f32 * 1e-3
}

/// Palette color for the detection at `index`, wrapping around the palette
pub fn palette_color(index: usize) -> Rgb<u8> {
    Rgb(PALETTE[index % PALETTE.len()])
}

/// Render masks and boxes over a copy of `image`
///
/// # Arguments
/// * `image` - Source bitmap, left untouched
/// * `detections` - Detections in `image` pixel coordinates
///
/// # Returns
/// A new bitmap of the same dimensions
pub fn render(image: &RgbImage, detections: &Detections) -> RgbImage {
    let mut annotated = image.clone();
    if let Some(masks) = detections.mask() {
        overlay_masks(&mut annotated, masks, &detections.area());
    }
    draw_boxes(&mut annotated, detections);
    annotated
}

fn overlay_masks(scene: &mut RgbImage, masks: &[image::GrayImage], areas: &[f32]) {
    // Descending area; smaller masks are painted last
    let mut order: Vec<usize> = (0..masks.len()).collect();
    order.sort_by(|&a, &b| areas[b].total_cmp(&areas[a]));

    let mut layer = scene.clone();
    for index in order {
        let color = palette_color(index);
        let mask = &masks[index];
        let width = mask.width().min(layer.width());
        let height = mask.height().min(layer.height());
        for y in 0..height {
            for x in 0..width {
                if mask.get_pixel(x, y).0[0] > 0 {
                    layer.put_pixel(x, y, color);
                }
            }
        }
    }

    for (dst, src) in scene.pixels_mut().zip(layer.pixels()) {
        for c in 0..3 {
            let blended =
                dst.0[c] as f32 * (1.0 - MASK_OPACITY) + src.0[c] as f32 * MASK_OPACITY;
            dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn draw_boxes(scene: &mut RgbImage, detections: &Detections) {
    let (w, h) = scene.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let thickness = optimal_line_thickness(w, h) as i32;
    let max_x = w as i32 - 1;
    let max_y = h as i32 - 1;

    for (index, bbox) in detections.xyxy().iter().enumerate() {
        let color = palette_color(index);
        let x_min = (bbox[0].floor() as i32).clamp(0, max_x);
        let y_min = (bbox[1].floor() as i32).clamp(0, max_y);
        let x_max = (bbox[2].ceil() as i32).clamp(0, max_x);
        let y_max = (bbox[3].ceil() as i32).clamp(0, max_y);

        for inset in 0..thickness {
            let left = x_min + inset;
            let top = y_min + inset;
            let right = x_max - inset;
            let bottom = y_max - inset;
            if left > right || top > bottom {
                break;
            }
            let rect = Rect::at(left, top)
                .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
            draw_hollow_rect_mut(scene, rect, color);
        }
    }
}
