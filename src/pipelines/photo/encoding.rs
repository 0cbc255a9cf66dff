// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding helpers
//!
//! This module covers the pixel-level work around persistence:
//! - JPEG encoding of a finished raster (with quality control)
//! - Inline previews handed back to a calling app
//! - Subsampled thumbnails, rotated to the file's EXIF orientation

use crate::constants::{THUMBNAIL_DECODE_FACTOR, THUMBNAIL_NO_ANIMATION_FACTOR};
use crate::errors::PhotoError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use jpeg_decoder::PixelFormat;
use std::io::Cursor;
use tracing::debug;

/// Decode compressed capture bytes into an RGB raster
pub fn decode(data: &[u8]) -> Result<RgbImage, PhotoError> {
    let image = image::load_from_memory(data).map_err(|e| PhotoError::DecodeFailed(e.to_string()))?;
    Ok(image.to_rgb8())
}

/// Image dimensions from the container header, without decoding pixels
pub fn dimensions(data: &[u8]) -> Result<(u32, u32), PhotoError> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| PhotoError::DecodeFailed(e.to_string()))
}

/// Encode image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    // Create JPEG encoder with quality setting
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);

    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| PhotoError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

    debug!(size = buffer.len(), quality, "JPEG encoding complete");
    Ok(buffer)
}

/// Shrink so the longest side is at most `max_side`, keeping aspect ratio
pub fn preview(image: &RgbImage, max_side: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if longest <= max_side {
        return image.clone();
    }
    let ratio = max_side as f64 / longest as f64;
    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);
    imageops::resize(image, new_width, new_height, FilterType::Triangle)
}

/// Power-of-two subsampling factor for a thumbnail shown at `display_width`
pub fn thumbnail_sample_size(source_width: u32, display_width: u32, animation: bool) -> u32 {
    let ratio = source_width.div_ceil(display_width.max(1)).max(1);
    let mut sample = ratio.next_power_of_two().saturating_mul(THUMBNAIL_DECODE_FACTOR);
    if !animation {
        sample = sample.saturating_mul(THUMBNAIL_NO_ANIMATION_FACTOR);
    }
    sample
}

/// Subsample `image` by `sample`, never below one pixel per side
pub fn thumbnail(image: &RgbImage, sample: u32) -> RgbImage {
    let sample = sample.max(1);
    let width = (image.width() / sample).max(1);
    let height = (image.height() / sample).max(1);
    imageops::thumbnail(image, width, height)
}

/// Rotate a raster to match an EXIF orientation value
///
/// Only the pure rotations (3, 6, 8) are handled; mirrored orientations are
/// left as they are.
pub fn rotate_for_orientation(image: RgbImage, orientation: Option<u16>) -> RgbImage {
    match orientation {
        Some(3) => imageops::rotate180(&image),
        Some(6) => imageops::rotate90(&image),
        Some(8) => imageops::rotate270(&image),
        _ => image,
    }
}

/// Decode JPEG `data` scaled down by `sample` for a thumbnail
///
/// The IDCT shrinks the image by up to 8 while decoding, so the full-size
/// raster is never allocated. Whatever scale is left is resampled after.
pub fn decode_thumbnail(data: &[u8], sample: u32) -> Result<RgbImage, PhotoError> {
    let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(data));
    decoder.read_info().map_err(decode_failed)?;
    let info = decoder
        .info()
        .ok_or_else(|| PhotoError::DecodeFailed("missing JPEG frame header".into()))?;

    let sample = sample.max(1);
    let width = (u32::from(info.width) / sample).max(1);
    let height = (u32::from(info.height) / sample).max(1);

    // Both fit: they are at most the header dimensions
    let (scaled_width, scaled_height) = decoder
        .scale(width as u16, height as u16)
        .map_err(decode_failed)?;
    let pixels = decoder.decode().map_err(decode_failed)?;
    let scaled = rgb_from_decoded(
        pixels,
        info.pixel_format,
        u32::from(scaled_width),
        u32::from(scaled_height),
    )?;

    debug!(
        source_width = info.width,
        source_height = info.height,
        scaled_width,
        scaled_height,
        sample,
        "Decoded thumbnail at reduced scale"
    );
    Ok(imageops::thumbnail(&scaled, width, height))
}

fn rgb_from_decoded(
    pixels: Vec<u8>,
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Result<RgbImage, PhotoError> {
    let rgb = match format {
        PixelFormat::RGB24 => pixels,
        PixelFormat::L8 => pixels.into_iter().flat_map(|l| [l, l, l]).collect(),
        PixelFormat::L16 => pixels
            .chunks_exact(2)
            .map(|c| (u16::from_ne_bytes([c[0], c[1]]) >> 8) as u8)
            .flat_map(|l| [l, l, l])
            .collect(),
        PixelFormat::CMYK32 => pixels
            .chunks_exact(4)
            .flat_map(|c| {
                let k = 255 - u32::from(c[3]);
                [c[0], c[1], c[2]].map(|v| ((255 - u32::from(v)) * k / 255) as u8)
            })
            .collect(),
    };
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| PhotoError::DecodeFailed("decoded thumbnail has the wrong size".into()))
}

fn decode_failed(e: jpeg_decoder::Error) -> PhotoError {
    PhotoError::DecodeFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn jpeg_round_trip_keeps_size() {
        let image = RgbImage::from_pixel(40, 30, Rgb([10, 200, 30]));
        let data = encode_jpeg(&image, 92).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
        assert_eq!(decode(&data).unwrap().dimensions(), (40, 30));
        assert_eq!(dimensions(&data).unwrap(), (40, 30));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        assert!(matches!(decode(b"not a jpeg"), Err(PhotoError::DecodeFailed(_))));
    }

    #[test]
    fn preview_caps_longest_side() {
        let image = RgbImage::new(1000, 500);
        assert_eq!(preview(&image, 128).dimensions(), (128, 64));
        let small = RgbImage::new(100, 50);
        assert_eq!(preview(&small, 128).dimensions(), (100, 50));
    }

    #[test]
    fn sample_size_rounds_up_to_power_of_two() {
        // 4000 / 500 = 8 -> 8 * 4
        assert_eq!(thumbnail_sample_size(4000, 500, true), 32);
        // 4000 / 600 = 6.67 -> 7 -> 8, then * 4 * 4
        assert_eq!(thumbnail_sample_size(4000, 600, false), 128);
        assert_eq!(thumbnail_sample_size(100, 1000, true), 4);
    }

    #[test]
    fn thumbnail_decode_matches_sample() {
        let image = RgbImage::from_fn(1024, 768, |x, y| Rgb([(x / 4) as u8, (y / 3) as u8, 90]));
        let data = encode_jpeg(&image, 92).unwrap();
        assert_eq!(decode_thumbnail(&data, 32).unwrap().dimensions(), (32, 24));
        // Below the IDCT's smallest scale the rest is resampled
        assert_eq!(decode_thumbnail(&data, 128).unwrap().dimensions(), (8, 6));
        assert_eq!(decode_thumbnail(&data, 1).unwrap().dimensions(), (1024, 768));
    }

    #[test]
    fn thumbnail_decode_keeps_colors() {
        let image = RgbImage::from_pixel(256, 256, Rgb([200, 40, 40]));
        let data = encode_jpeg(&image, 95).unwrap();
        let thumbnail = decode_thumbnail(&data, 16).unwrap();
        let pixel = thumbnail.get_pixel(8, 8);
        assert!(pixel[0] > 180 && pixel[1] < 70 && pixel[2] < 70, "got {:?}", pixel);
    }

    #[test]
    fn thumbnail_decode_handles_grayscale() {
        let image = image::GrayImage::from_pixel(64, 64, image::Luma([120]));
        let mut data = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, 95)
            .encode(image.as_raw(), 64, 64, image::ExtendedColorType::L8)
            .unwrap();
        let thumbnail = decode_thumbnail(&data, 8).unwrap();
        assert_eq!(thumbnail.dimensions(), (8, 8));
        let pixel = thumbnail.get_pixel(4, 4);
        assert_eq!(pixel[0], pixel[1]);
        assert!(pixel[0].abs_diff(120) < 8);
    }

    #[test]
    fn thumbnail_decode_rejects_garbage() {
        assert!(matches!(decode_thumbnail(b"not a jpeg", 4), Err(PhotoError::DecodeFailed(_))));
    }

    #[test]
    fn orientation_rotates_dimensions() {
        let image = RgbImage::new(4, 2);
        assert_eq!(rotate_for_orientation(image.clone(), Some(6)).dimensions(), (2, 4));
        assert_eq!(rotate_for_orientation(image.clone(), Some(3)).dimensions(), (4, 2));
        assert_eq!(rotate_for_orientation(image, Some(1)).dimensions(), (4, 2));
    }
}
