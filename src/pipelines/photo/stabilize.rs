// SPDX-License-Identifier: GPL-3.0-only

//! Auto-stabilization: rotate by the measured tilt, then crop
//!
//! The rotated image is scaled so its bounding box has the same area as the
//! source, then center-cropped to the largest rectangle with the source
//! aspect ratio that only contains rotated content.

use crate::constants::DEGENERATE_DENOMINATOR;
use image::{Rgb, RgbImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::debug;

/// Axis-aligned crop rectangle in rotated-canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Everything needed to stabilize an image of a given size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilizePlan {
    /// Rotation applied in degrees, clockwise positive
    pub rotation: f64,
    pub scale: f64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// `None` when the crop computation degenerates
    pub crop: Option<CropRect>,
}

impl StabilizePlan {
    /// Size of the final image
    pub fn output_size(&self) -> (u32, u32) {
        match self.crop {
            Some(crop) => (crop.width, crop.height),
            None => (self.canvas_width, self.canvas_height),
        }
    }
}

/// Fold an angle in degrees into [-90, 90]
///
/// Non-finite angles map to zero.
pub fn normalize_angle(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let mut angle = degrees % 180.0;
    if angle > 90.0 {
        angle -= 180.0;
    } else if angle < -90.0 {
        angle += 180.0;
    }
    angle
}

/// Compute the rotation, canvas and crop for a `width` x `height` image
pub fn plan(width: u32, height: u32, angle: f64, front_facing: bool) -> StabilizePlan {
    let angle = normalize_angle(angle);
    let theta = angle.to_radians().abs();
    let (sin, cos, tan) = (theta.sin(), theta.cos(), theta.tan());

    let mut w1 = width as f64;
    let mut h1 = height as f64;
    let mut w0 = w1 * cos + h1 * sin;
    let mut h0 = w1 * sin + h1 * cos;

    let scale = ((w1 * h1) / (w0 * h0)).sqrt();
    w0 *= scale;
    h0 *= scale;
    w1 *= scale;
    h1 *= scale;

    let canvas_width = (w0.round() as u32).max(1);
    let canvas_height = (h0.round() as u32).max(1);
    let rotation = if front_facing { -angle } else { angle };

    let denom = h1 / w1 + tan;
    let alt_denom = w1 / h1 + tan;
    let crop = if !(denom >= DEGENERATE_DENOMINATOR) || !(alt_denom >= DEGENERATE_DENOMINATOR) {
        debug!(denom, alt_denom, "Degenerate stabilize crop, keeping full canvas");
        None
    } else {
        let mut w2 = ((h0 + 2.0 * h1 * sin * tan - w0 * tan) / denom) as i64;
        let mut h2 = (w2 as f64 * h1 / w1) as i64;
        let alt_h2 = ((w0 + 2.0 * w1 * sin * tan - h0 * tan) / alt_denom) as i64;
        let alt_w2 = (alt_h2 as f64 * w1 / h1) as i64;
        if alt_w2 < w2 {
            w2 = alt_w2;
            h2 = alt_h2;
        }
        let w2 = clamp_dimension(w2, canvas_width);
        let h2 = clamp_dimension(h2, canvas_height);
        Some(CropRect {
            x: canvas_width.saturating_sub(w2) / 2,
            y: canvas_height.saturating_sub(h2) / 2,
            width: w2,
            height: h2,
        })
    };

    StabilizePlan {
        rotation,
        scale,
        canvas_width,
        canvas_height,
        crop,
    }
}

fn clamp_dimension(value: i64, canvas: u32) -> u32 {
    if value <= 0 {
        1
    } else if value >= canvas as i64 {
        canvas.saturating_sub(1).max(1)
    } else {
        value as u32
    }
}

/// Rotate, scale and crop `image` to remove a tilt of `angle` degrees
pub fn stabilize(image: &RgbImage, angle: f64, front_facing: bool) -> RgbImage {
    let (width, height) = image.dimensions();
    let plan = plan(width, height, angle, front_facing);
    debug!(
        width,
        height,
        rotation = plan.rotation,
        scale = plan.scale,
        crop = ?plan.crop,
        "Stabilizing photo"
    );

    let projection = Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0)
        .and_then(Projection::scale(plan.scale as f32, plan.scale as f32))
        .and_then(Projection::rotate((plan.rotation as f32).to_radians()))
        .and_then(Projection::translate(
            plan.canvas_width as f32 / 2.0,
            plan.canvas_height as f32 / 2.0,
        ));

    let mut rotated = RgbImage::new(plan.canvas_width, plan.canvas_height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut rotated,
    );

    match plan.crop {
        Some(crop) => imageops::crop_imm(&rotated, crop.x, crop.y, crop.width, crop.height).to_image(),
        None => rotated,
    }
}
